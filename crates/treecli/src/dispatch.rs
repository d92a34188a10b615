//! One run of a command tree: validate, serve `--json`/`--help`, parse,
//! merge values across levels and invoke the selected callback(s).

use crate::callback::Kwargs;
use crate::cli::Cli;
use crate::config::DefaultOverlay;
use crate::dump;
use crate::error::RunError;
use crate::help::{self, HelpPath, HelpRenderer};
use crate::model::{Argument, Opt};
use crate::parser::{self, Parsed};
use crate::style::Painter;
use crate::tree::{self, Node};
use crate::validate::validate;
use crate::{HELP_FLAGS, JSON_FLAGS};
use indexmap::IndexMap;
use std::process::ExitCode;
use tracing::debug;
use treecli_argparse::args;
use treecli_argparse::report::ParseError;
use treecli_metadata::{Nargs, NodeDump, Value};

/// What a successful run did.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A command or chain ran; `path` names the selected nodes below the root.
    Dispatched { path: Vec<String> },
    /// Help text was rendered instead of dispatching.
    Help(String),
    /// `--json` was requested.
    Structure(NodeDump),
}

/// A declaration contributing to one destination.
#[derive(Clone, Copy)]
enum Decl<'a> {
    Argument(&'a Argument),
    Option(&'a Opt),
}

impl Cli {
    /// Run against `std::env::args`, printing output and errors.
    pub fn run(&self) -> anyhow::Result<ExitCode> {
        self.run_from(std::env::args().skip(1))
    }

    /// Run against `argv` (without the program name), printing help and
    /// structure output to stdout and user-facing errors to stderr.
    ///
    /// Callback failures are returned as `Err`; every other failure is
    /// reported here and mapped to an exit code.
    pub fn run_from<I, S>(&self, argv: I) -> anyhow::Result<ExitCode>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let painter = Painter::new(self.get_colors(), self.get_color().stderr_enabled());
        let err = match self.dispatch(&argv) {
            Ok(Outcome::Dispatched { .. }) => return Ok(ExitCode::SUCCESS),
            Ok(Outcome::Help(text)) => {
                print!("{text}");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(Outcome::Structure(dump)) => {
                println!("{}", dump.to_json_pretty()?);
                return Ok(ExitCode::SUCCESS);
            }
            Err(err) => err,
        };

        let code = ExitCode::from(err.exit_code());
        match err {
            RunError::Callback(err) => return Err(err),
            RunError::Parse(err) => eprintln!("{}", help::render_error(&err, painter)),
            RunError::Definition(errs) => {
                for err in errs.iter() {
                    eprintln!("{} {err}", painter.paint_spec("Error:", "bold red", false));
                }
            }
            RunError::Config(err) => {
                eprintln!("{} {err}", painter.paint_spec("Error:", "bold red", false));
            }
        }
        Ok(code)
    }

    /// Run against `argv` without printing anything.
    pub fn dispatch<S: AsRef<str>>(&self, argv: &[S]) -> Result<Outcome, RunError> {
        let argv: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();
        validate(self)?;

        if args::flag(&argv, JSON_FLAGS) {
            debug!("serving structure dump");
            return Ok(Outcome::Structure(dump::structure(self)));
        }

        let overlay = DefaultOverlay::for_cli(self)?;
        let painter = Painter::new(self.get_colors(), self.get_color().stdout_enabled());
        let renderer = HelpRenderer::new(self, &overlay, painter);

        if args::flag(&argv, HELP_FLAGS) {
            let path = help::help_path(self, args::tokens_before(&argv, HELP_FLAGS))?;
            debug!(path = ?path.names, trailing = path.trailing, "serving help");
            return Ok(Outcome::Help(renderer.render(&path)?));
        }

        let mut parser = parser::build(self)?;
        let parsed = parser.parse(&argv)?;
        let nodes = tree::resolve_path(self.root(), &parsed.path)?;
        let (leaf, ancestors) = match nodes.split_last() {
            Some((leaf, ancestors)) if leaf.is_leaf() => (*leaf, ancestors),
            _ => {
                debug!(path = ?parsed.path, "no command selected; rendering help");
                let path = HelpPath::new(parsed.path.iter().cloned());
                return Ok(Outcome::Help(renderer.render(&path)?));
            }
        };

        let kwargs = collect_kwargs(&nodes, ancestors, leaf, &parsed, &overlay)?;
        debug!(target = leaf.name(), values = kwargs.len(), "dispatching");
        match leaf {
            Node::Command(cmd) => cmd.callback.call(&kwargs).map_err(RunError::Callback)?,
            Node::Chain(chain) => {
                for member in &chain.commands {
                    debug!(chain = %chain.name, member = %member.name, "running chain member");
                    member
                        .callback
                        .call(&kwargs.subset_for(&member.callback))
                        .map_err(RunError::Callback)?;
                }
            }
            Node::Root(_) | Node::Group(_) => {}
        }
        Ok(Outcome::Dispatched { path: parsed.path })
    }
}

/// Merge parsed levels, defaults and the overlay into the callback's
/// keyword arguments, failing on missing required values.
fn collect_kwargs<'a>(
    path: &[Node<'a>],
    ancestors: &[Node<'a>],
    leaf: Node<'a>,
    parsed: &Parsed,
    overlay: &DefaultOverlay,
) -> Result<Kwargs, RunError> {
    let set = tree::effective_set(ancestors, leaf)?;

    let mut missing = Vec::new();
    for arg in &set.arguments {
        let dest = arg.get_dest();
        if arg.min_values() >= 1 && arg.default.is_none() && !parsed.supplied(dest) {
            missing.push(arg.name.clone());
        }
    }
    for node in path {
        for opt in node.local_options()? {
            let supplied = opt.get_dest().is_some_and(|dest| parsed.supplied(&dest));
            if opt.required && !supplied {
                missing.push(opt.flags.join("/"));
            }
        }
    }
    if !missing.is_empty() {
        return Err(ParseError::missing_required(&missing).into());
    }

    let mut decls: IndexMap<String, Vec<Decl<'_>>> = IndexMap::new();
    for arg in &set.arguments {
        decls
            .entry(arg.get_dest().to_string())
            .or_default()
            .push(Decl::Argument(*arg));
    }
    for resolved in &set.options {
        decls
            .entry(resolved.dest.clone())
            .or_default()
            .push(Decl::Option(resolved.opt));
    }

    let mut kwargs = Kwargs::new();
    for (dest, decls) in &decls {
        // The deepest level that saw the value on the command line wins.
        let supplied = parsed.levels.iter().rev().find_map(|level| level.get(dest));
        let value = match supplied {
            Some(value) => value.clone(),
            None => decls
                .iter()
                .rev()
                .find_map(|decl| decl.default_value(dest, overlay))
                .cloned()
                .unwrap_or_else(|| fallback(decls.last().copied())),
        };
        kwargs.insert(dest.clone(), value);
    }
    Ok(kwargs)
}

impl<'a> Decl<'a> {
    fn default_value(self, dest: &str, overlay: &'a DefaultOverlay) -> Option<&'a Value> {
        match self {
            Decl::Argument(arg) => arg.default.as_ref(),
            Decl::Option(opt) => overlay.default_for(dest, opt),
        }
    }
}

/// Value for a destination nobody supplied and nothing defaults.
fn fallback(decl: Option<Decl<'_>>) -> Value {
    let nargs = match decl {
        Some(Decl::Option(opt)) if opt.is_flag => return Value::Bool(false),
        Some(Decl::Option(opt)) => opt.nargs,
        Some(Decl::Argument(arg)) => arg.nargs,
        None => None,
    };
    match nargs {
        Some(Nargs::ZeroOrMore) => Value::List(Vec::new()),
        _ => Value::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Callback, ParamType};
    use crate::model::{Chain, Command, Group};
    use crate::style::ColorChoice;
    use std::cell::RefCell;
    use std::rc::Rc;
    use treecli_argparse::report::ParseErrorKind;
    use treecli_metadata::ValueType;

    type Calls = Rc<RefCell<Vec<(String, Kwargs)>>>;

    fn recorder(calls: &Calls, name: &str) -> Callback {
        let calls = Rc::clone(calls);
        let tag = name.to_string();
        Callback::new(name, move |kwargs| {
            calls.borrow_mut().push((tag.clone(), kwargs.clone()));
            Ok(())
        })
    }

    fn run(cli: &Cli, argv: &[&str]) -> Result<Outcome, RunError> {
        cli.dispatch(argv)
    }

    #[test]
    fn flagless_command_gets_no_arguments() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(Command::new("hello", recorder(&calls, "hello")));
        let Ok(Outcome::Dispatched { path }) = run(&cli, &["hello"]) else {
            panic!("expected dispatch");
        };
        assert_eq!(path, vec!["hello"]);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.is_empty());
    }

    #[test]
    fn inherited_option_reaches_the_command() {
        let calls = Calls::default();
        let cli = Cli::new("app").group(
            Group::new("user")
                .option(
                    Opt::new(["--verbose"])
                        .arg_type(ValueType::Bool)
                        .default(false),
                )
                .command(
                    Command::new(
                        "greet",
                        recorder(&calls, "greet")
                            .param("name", ValueType::Str)
                            .param("verbose", ValueType::Bool),
                    )
                    .argument(Argument::new("name")),
                ),
        );
        run(&cli, &["user", "--verbose", "true", "greet", "Alice"]).unwrap();
        let calls = calls.borrow();
        let kwargs = &calls[0].1;
        assert_eq!(kwargs.get::<String>("name").unwrap(), "Alice");
        assert!(kwargs.get::<bool>("verbose").unwrap());
    }

    #[test]
    fn default_applies_when_option_absent() {
        let calls = Calls::default();
        let cli = Cli::new("app")
            .option(Opt::new(["--verbose"]).arg_type(ValueType::Bool).default(false))
            .command(Command::new(
                "greet",
                recorder(&calls, "greet").param("verbose", ValueType::Bool),
            ));
        run(&cli, &["greet"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("verbose"), Some(&Value::Bool(false)));
    }

    #[test]
    fn invalid_choice_is_a_parse_error() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new(
                "set-level",
                recorder(&calls, "set").param("level", ValueType::Int),
            )
            .option(
                Opt::new(["--level"])
                    .arg_type(ValueType::Int)
                    .choices([2, 3, 4]),
            ),
        );
        let Err(RunError::Parse(err)) = run(&cli, &["set-level", "--level", "5"]) else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind(), ParseErrorKind::InvalidChoice);
        assert!(err.message().contains("2, 3, 4"), "{}", err.message());
        assert!(calls.borrow().is_empty());

        run(&cli, &["set-level", "--level", "3"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("level"), Some(&Value::Int(3)));
    }

    #[test]
    fn chain_members_get_their_own_subset() {
        let calls = Calls::default();
        let chain = Chain::new(
            "chain",
            vec![
                Command::new("cmd1", recorder(&calls, "cmd1").param("a", ValueType::Int))
                    .argument(Argument::new("a").arg_type(ValueType::Int)),
                Command::new("cmd2", recorder(&calls, "cmd2").param("b", ValueType::Str))
                    .argument(Argument::new("b")),
            ],
        );
        let cli = Cli::new("app").chain(chain);
        run(&cli, &["chain", "42", "hello"]).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "cmd1");
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].1.get::<i64>("a").unwrap(), 42);
        assert_eq!(calls[1].0, "cmd2");
        assert_eq!(calls[1].1.len(), 1);
        assert_eq!(calls[1].1.get::<String>("b").unwrap(), "hello");
    }

    #[test]
    fn chain_members_skip_inherited_options_they_do_not_take() {
        let calls = Calls::default();
        let chain = Chain::new(
            "chain",
            vec![
                Command::new("cmd1", recorder(&calls, "cmd1").param("a", ValueType::Int))
                    .argument(Argument::new("a").arg_type(ValueType::Int)),
                Command::new(
                    "cmd2",
                    recorder(&calls, "cmd2")
                        .param("b", ValueType::Str)
                        .param("verbose", ValueType::Bool),
                )
                .argument(Argument::new("b")),
            ],
        );
        let cli = Cli::new("app")
            .option(Opt::new(["--verbose", "-v"]).flag())
            .chain(chain);
        run(&cli, &["chain", "42", "hello"]).unwrap();
        run(&cli, &["-v", "chain", "7", "bye"]).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].0, "cmd1");
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].1.get::<i64>("a").unwrap(), 42);
        assert_eq!(calls[1].0, "cmd2");
        assert_eq!(calls[1].1.get::<String>("b").unwrap(), "hello");
        assert!(!calls[1].1.get::<bool>("verbose").unwrap());
        assert_eq!(calls[2].1.len(), 1);
        assert!(calls[3].1.get::<bool>("verbose").unwrap());
    }

    #[test]
    fn malformed_bool_literal_is_a_parse_error() {
        let calls = Calls::default();
        let cli = Cli::new("app").group(
            Group::new("user")
                .option(Opt::new(["--verbose"]).arg_type(ValueType::Bool))
                .command(
                    Command::new(
                        "greet",
                        recorder(&calls, "greet")
                            .param("name", ValueType::Str)
                            .param("verbose", ValueType::Bool),
                    )
                    .argument(Argument::new("name")),
                ),
        );
        let Err(err) = run(&cli, &["user", "--verbose", "maybe", "greet", "Alice"]) else {
            panic!("expected parse error");
        };
        assert_eq!(err.exit_code(), 2);
        let RunError::Parse(err) = err else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind(), ParseErrorKind::InvalidValue);
        assert!(err.message().contains("'maybe'"), "{}", err.message());
        assert!(calls.borrow().is_empty());

        run(&cli, &["user", "--verbose", "N", "greet", "Alice"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("verbose"), Some(&Value::Bool(false)));
    }

    #[test]
    fn float_option_accepts_integer_choices() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new("scale", recorder(&calls, "scale").param("ratio", ValueType::Float))
                .option(
                    Opt::new(["--ratio"])
                        .arg_type(ValueType::Float)
                        .choices([1, 2]),
                ),
        );
        run(&cli, &["scale", "--ratio", "2"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("ratio"), Some(&Value::Float(2.0)));
        assert!(matches!(
            run(&cli, &["scale", "--ratio", "1.5"]),
            Err(RunError::Parse(_))
        ));
    }

    #[test]
    fn zero_or_more_without_values_is_empty_list() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new(
                "tag",
                recorder(&calls, "tag")
                    .param("tags", ParamType::List(ValueType::Str))
                    .param("labels", ParamType::AnyList),
            )
            .argument(Argument::new("tags").nargs(Nargs::ZeroOrMore))
            .option(Opt::new(["--labels"]).nargs(Nargs::ZeroOrMore)),
        );
        run(&cli, &["tag"]).unwrap();
        let calls = calls.borrow();
        assert_eq!(calls[0].1.raw("tags"), Some(&Value::List(Vec::new())));
        assert_eq!(calls[0].1.get::<Vec<String>>("labels").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn missing_positional_is_reported() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new("greet", recorder(&calls, "greet").param("name", ValueType::Str))
                .argument(Argument::new("name")),
        );
        let Err(RunError::Parse(err)) = run(&cli, &["greet"]) else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind(), ParseErrorKind::MissingRequired);
        assert_eq!(err.message(), "the following arguments are required: name");
    }

    #[test]
    fn required_option_enforced_only_on_dispatch() {
        let calls = Calls::default();
        let cli = Cli::new("app").group(
            Group::new("db")
                .option(Opt::new(["--url", "-u"]).required(true))
                .command(Command::new("ping", recorder(&calls, "ping").untyped("url"))),
        );
        assert!(matches!(run(&cli, &["db"]), Ok(Outcome::Help(_))));

        let Err(RunError::Parse(err)) = run(&cli, &["db", "ping"]) else {
            panic!("expected parse error");
        };
        assert!(err.message().ends_with("--url/-u"), "{}", err.message());

        run(&cli, &["db", "ping", "-u", "pg://x"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("url"), Some(&Value::from("pg://x")));
    }

    #[test]
    fn deepest_value_and_most_local_default_win() {
        let calls = Calls::default();
        let cli = Cli::new("app")
            .option(Opt::new(["--mode"]).default("root"))
            .option(Opt::new(["--color"]).default("auto"))
            .command(
                Command::new(
                    "go",
                    recorder(&calls, "go").untyped("mode").untyped("color"),
                )
                .option(Opt::new(["--mode"]).default("leaf")),
            );
        run(&cli, &["go"]).unwrap();
        run(&cli, &["--color", "never", "go", "--color", "always"]).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls[0].1.raw("mode"), Some(&Value::from("leaf")));
        assert_eq!(calls[0].1.raw("color"), Some(&Value::from("auto")));
        assert_eq!(calls[1].1.raw("color"), Some(&Value::from("always")));
    }

    #[test]
    fn typed_positional_arrives_typed() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new("sq", recorder(&calls, "sq").param("n", ValueType::Int))
                .argument(Argument::new("n").arg_type(ValueType::Int)),
        );
        run(&cli, &["sq", "42"]).unwrap();
        assert_eq!(calls.borrow()[0].1.raw("n"), Some(&Value::Int(42)));
    }

    #[test]
    fn group_positional_is_consumed_at_its_level() {
        let calls = Calls::default();
        let cli = Cli::new("app").group(
            Group::new("user")
                .argument(Argument::new("user_id").arg_type(ValueType::Int))
                .command(
                    Command::new(
                        "add",
                        recorder(&calls, "add")
                            .param("user_id", ValueType::Int)
                            .param("name", ValueType::Str),
                    )
                    .argument(Argument::new("name")),
                ),
        );
        run(&cli, &["user", "7", "add", "bob"]).unwrap();
        let calls = calls.borrow();
        assert_eq!(calls[0].1.raw("user_id"), Some(&Value::Int(7)));
        assert_eq!(calls[0].1.raw("name"), Some(&Value::from("bob")));
    }

    #[test]
    fn reserved_flags_short_circuit() {
        let calls = Calls::default();
        let cli = Cli::new("app")
            .color(ColorChoice::Never)
            .group(Group::new("user").command(Command::new("add", recorder(&calls, "add"))));

        let Ok(Outcome::Structure(dump)) = run(&cli, &["user", "--bogus", "-j"]) else {
            panic!("expected structure");
        };
        assert_eq!(dump.name, "app");

        let Ok(Outcome::Help(text)) = run(&cli, &["user", "--help"]) else {
            panic!("expected help");
        };
        assert!(text.starts_with("Usage: app user ..."), "{text}");
        assert!(calls.borrow().is_empty());

        assert!(matches!(
            run(&cli, &["nope", "--help"]),
            Err(RunError::Parse(_))
        ));
    }

    #[test]
    fn definition_errors_stop_the_run() {
        let calls = Calls::default();
        let cli = Cli::new("app").command(
            Command::new("greet", recorder(&calls, "greet")).argument(Argument::new("name")),
        );
        let Err(err) = run(&cli, &["--help"]) else {
            panic!("expected definition error");
        };
        assert!(matches!(err, RunError::Definition(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn overlay_overrides_option_defaults() {
        let calls = Calls::default();
        let dir = std::env::temp_dir().join(format!(
            "treecli-dispatch-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("defaults.toml");
        std::fs::write(&path, "level = \"4\"\n").unwrap();

        let cli = Cli::new("app").config_file(&path).command(
            Command::new("set", recorder(&calls, "set").param("level", ValueType::Int)).option(
                Opt::new(["--level"])
                    .arg_type(ValueType::Int)
                    .choices([2, 3, 4])
                    .default(2),
            ),
        );
        run(&cli, &["set"]).unwrap();
        run(&cli, &["set", "--level", "3"]).unwrap();
        let calls = calls.borrow();
        assert_eq!(calls[0].1.raw("level"), Some(&Value::Int(4)));
        assert_eq!(calls[1].1.raw("level"), Some(&Value::Int(3)));

        let missing = Cli::new("app").config_file(dir.join("absent.toml"));
        let Err(err) = run(&missing, &[]) else {
            panic!("expected config error");
        };
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn callback_failure_propagates() {
        let cli = Cli::new("app").command(Command::new(
            "boom",
            Callback::new("boom", |_| anyhow::bail!("exploded")),
        ));
        let Err(RunError::Callback(err)) = run(&cli, &["boom"]) else {
            panic!("expected callback error");
        };
        assert_eq!(err.to_string(), "exploded");
        assert!(cli.run_from(["boom"]).is_err());
    }
}
