use anyhow::Result;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use treecli::{
    Argument, Callback, Chain, Cli, Command, Group, Kwargs, Nargs, Opt, ParamType, ValueType,
};

/// Path of a TOML or JSON file overriding option defaults.
const DEFAULTS_ENV: &str = "TREECLI_DEMO_DEFAULTS";

fn main() -> Result<ExitCode> {
    init_tracing();
    let mut cli = build_cli();
    if let Some(path) = std::env::var_os(DEFAULTS_ENV) {
        debug!(path = ?path, "using default overrides");
        cli = cli.config_file(path);
    }
    cli.run()
}

fn build_cli() -> Cli {
    Cli::new("treecli-demo")
        .help(
            "This CLI provides commands to handle various tasks with subcommands for specific \
             actions.",
        )
        .show_types(true)
        .show_defaults(true)
        .command(info_command())
        .group(project_group())
        .group(user_group())
        .chain(setup_chain())
}

fn info_command() -> Command {
    let info = Callback::new("info", |kw: &Kwargs| {
        println!("CLI Information");
        if kw.get::<bool>("verbose")? {
            println!("Detailed mode enabled.");
        }
        Ok(())
    })
    .param("verbose", ValueType::Bool);

    Command::new("info", info)
        .help("Display CLI information.")
        .option(
            Opt::new(["--verbose", "-v"])
                .flag()
                .help("Show detailed information."),
        )
}

fn project_group() -> Group {
    let set_level = Callback::new("set_level", |kw: &Kwargs| {
        let level = kw.get::<i64>("level")?;
        if kw.get::<bool>("dry_run")? {
            println!("Level would be set to {level}");
        } else {
            println!("Level set to {level}");
        }
        Ok(())
    })
    .param("level", ValueType::Int)
    .param("dry_run", ValueType::Bool);

    Group::new("project")
        .help("Manage project-related operations.")
        .command(
            Command::new("set-level", set_level)
                .help("Set the project build level.")
                .option(
                    Opt::new(["--level", "-l"])
                        .arg_type(ValueType::Int)
                        .choices([2, 3, 4])
                        .default(2)
                        .help("Optimization level."),
                )
                .option(
                    Opt::new(["--dry-run", "-n"])
                        .arg_type(ValueType::Bool)
                        .default(false)
                        .help("Report the change without applying it (yes/no)."),
                ),
        )
}

fn user_group() -> Group {
    let add_user = Callback::new("add_user", |kw: &Kwargs| {
        println!("Adding user: {}", kw.get::<String>("name")?);
        if let Some(email) = kw.get::<Option<String>>("email")? {
            println!("Email: {email}");
        }
        Ok(())
    })
    .param("name", ValueType::Str)
    .param("email", ValueType::Str);

    let list_users = Callback::new("list_users", |_: &Kwargs| {
        println!("Listing all users...");
        Ok(())
    });

    Group::new("user")
        .help("Manage user-related operations.")
        .command(
            Command::new("add", add_user)
                .help("Add a new user to the system.")
                .argument(Argument::new("name"))
                .option(
                    Opt::new(["--email", "-e"]).help("Email address of the user"),
                ),
        )
        .command(Command::new("list", list_users).help("List all users in the system."))
        .group(manage_group())
}

fn manage_group() -> Group {
    let set_role = Callback::new("set_role", |kw: &Kwargs| {
        let user_id = match kw.get::<Option<String>>("user_id_option")? {
            Some(id) => id,
            None => kw
                .get::<Option<String>>("user_id")?
                .unwrap_or_else(|| "unspecified".to_string()),
        };
        let reason = match kw.get::<Option<String>>("reason_option")? {
            Some(reason) => Some(reason),
            None => kw.get::<Option<String>>("reason")?,
        };
        println!("Setting role {} for user ID {user_id}", kw.get::<String>("role")?);
        if let Some(reason) = reason {
            println!("Reason: {reason}");
        }
        Ok(())
    })
    .param("role", ValueType::Str)
    .param("user_id", ValueType::Str)
    .param("reason", ValueType::Str)
    .param("user_id_option", ValueType::Str)
    .param("reason_option", ValueType::Str);

    let remove_role = Callback::new("remove_role", |kw: &Kwargs| {
        println!(
            "Removing role {} for user {}",
            kw.get::<String>("role")?,
            kw.get::<String>("user_id")?
        );
        Ok(())
    })
    .param("role", ValueType::Str)
    .param("user_id", ValueType::Str);

    let add_permission = Callback::new("add_permission", |kw: &Kwargs| {
        println!(
            "Adding permission {} for user {}",
            kw.get::<String>("permission")?,
            kw.get::<String>("user_id")?
        );
        Ok(())
    })
    .param("user_id", ValueType::Str)
    .param("permission", ValueType::Str);

    Group::new("manage")
        .help("Manage user settings and permissions.")
        .command(
            Command::new("set-role", set_role)
                .help("Set a role for a user.")
                .argument(Argument::new("role"))
                .argument(Argument::new("user_id").nargs(Nargs::Optional))
                .argument(Argument::new("reason").nargs(Nargs::Optional))
                .option(
                    Opt::new(["--user-id", "-u"])
                        .dest("user_id_option")
                        .help(
                            "User ID to set role for (unspecified if not provided), where the \
                             help is really really long to test the wrapping of the lines in \
                             the CLI even if the terminal width is really wide it still tests \
                             it because it is just so very very long.",
                        ),
                )
                .option(
                    Opt::new(["--reason", "-r"])
                        .dest("reason_option")
                        .help("Reason for setting the role"),
                ),
        )
        .command(
            Command::new("remove-role", remove_role)
                .help("Remove a role from a user.")
                .argument(Argument::new("role"))
                .argument(Argument::new("user_id")),
        )
        .group(
            Group::new("permissions")
                .help("Manage user permissions.")
                .group(
                    Group::new("set").help("Manage user permissions.").command(
                        Command::new("add", add_permission)
                            .help("Add a permission for a user.")
                            .argument(Argument::new("user_id"))
                            .argument(Argument::new("permission")),
                    ),
                ),
        )
}

fn setup_chain() -> Chain {
    let init = Callback::new("init_project", |kw: &Kwargs| {
        println!("Initializing project {}", kw.get::<String>("project")?);
        Ok(())
    })
    .param("project", ValueType::Str);

    let tag = Callback::new("tag_project", |kw: &Kwargs| {
        let tags = kw.get::<Vec<String>>("tags")?;
        if tags.is_empty() {
            println!("No tags");
        } else {
            println!("Tagged: {}", tags.join(", "));
        }
        Ok(())
    })
    .param("tags", ParamType::List(ValueType::Str));

    Chain::new(
        "setup",
        vec![
            Command::new("init", init).argument(Argument::new("project")),
            Command::new("tag", tag).argument(Argument::new("tags").nargs(Nargs::ZeroOrMore)),
        ],
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
