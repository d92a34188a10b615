//! Machine-readable description of the whole tree, served by `--json`.

use crate::cli::Cli;
use crate::model::{Argument, Opt};
use crate::tree::{self, Node};
use treecli_metadata::{ArgumentDump, NodeDump, NodeKind, OptionDump};

/// Describe the tree below (and including) the root.
pub fn structure(cli: &Cli) -> NodeDump {
    describe(cli.root())
}

/// Pretty JSON for terminal output.
pub fn structure_json(cli: &Cli) -> serde_json::Result<String> {
    structure(cli).to_json_pretty()
}

fn describe(node: Node<'_>) -> NodeDump {
    let mut dump = NodeDump {
        name: node.name().to_string(),
        help: node.help().into_owned(),
        sort_key: node.sort_key(),
        kind: node.kind(),
        options: Vec::new(),
        arguments: Vec::new(),
        callback: None,
        chained: None,
        subgroups: None,
        commands: None,
    };

    match node {
        Node::Root(group) | Node::Group(group) => {
            dump.options = options(&group.options);
            dump.arguments = arguments(&group.arguments);
            let (subgroups, commands): (Vec<_>, Vec<_>) = node
                .children()
                .into_iter()
                .map(describe)
                .partition(|child| child.kind == NodeKind::Group);
            dump.subgroups = Some(subgroups);
            dump.commands = Some(commands);
        }
        Node::Command(cmd) => {
            dump.options = options(&cmd.options);
            dump.arguments = arguments(&cmd.arguments);
            dump.callback = Some(cmd.callback.name().to_string());
        }
        Node::Chain(chain) => {
            dump.chained = Some(
                chain
                    .commands
                    .iter()
                    .map(|member| describe(Node::Command(member)))
                    .collect(),
            );
        }
    }
    dump
}

fn options(opts: &[Opt]) -> Vec<OptionDump> {
    tree::option_order(opts)
        .into_iter()
        .map(|opt| OptionDump {
            flags: opt.flags.clone(),
            dest: opt.get_dest().unwrap_or_default(),
            arg_type: opt.arg_type,
            help: opt.help.clone(),
            default: opt.default.clone(),
            nargs: opt.nargs,
            choices: opt.choices.clone(),
            sort_key: opt.sort_key,
            required: opt.required,
            inherit: opt.inherit,
            is_flag: opt.is_flag,
        })
        .collect()
}

fn arguments(args: &[Argument]) -> Vec<ArgumentDump> {
    let args: Vec<&Argument> = args.iter().collect();
    tree::display_order(&args)
        .into_iter()
        .map(|arg| ArgumentDump {
            name: arg.name.clone(),
            dest: arg.dest.clone(),
            arg_type: arg.arg_type,
            help: arg.help.clone(),
            nargs: arg.nargs,
            default: arg.default.clone(),
            choices: arg.choices.clone(),
            sort_key: arg.sort_key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use crate::model::{Chain, Command, Group};
    use serde_json::Value as Json;
    use treecli_metadata::{Nargs, Value, ValueType};

    fn cb(name: &str) -> Callback {
        Callback::new(name, |_| Ok(()))
    }

    fn sample() -> Cli {
        Cli::new("app")
            .help("Demo")
            .option(Opt::new(["--verbose", "-v"]).flag())
            .option(Opt::new(["--color"]).sort_key(-1))
            .command(
                Command::new("hello", cb("say_hello"))
                    .argument(Argument::new("zeta"))
                    .argument(Argument::new("alpha").nargs(Nargs::ZeroOrMore)),
            )
            .group(
                Group::new("user")
                    .sort_key(5)
                    .command(Command::new("add", cb("add_user")).option(
                        Opt::new(["--level"])
                            .arg_type(ValueType::Int)
                            .choices([2, 3, 4])
                            .default(2),
                    )),
            )
            .chain(Chain::new(
                "both",
                vec![Command::new("one", cb("one")), Command::new("two", cb("two"))],
            ))
    }

    #[test]
    fn root_is_tagged_cli_with_sorted_children() {
        let dump = structure(&sample());
        assert_eq!(dump.kind, NodeKind::Cli);
        let flags: Vec<&str> = dump.options.iter().map(|o| o.flags[0].as_str()).collect();
        assert_eq!(flags, vec!["--color", "--verbose"]);

        let commands: Vec<&str> = dump
            .commands
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(commands, vec!["both", "hello"]);
        let subgroups = dump.subgroups.as_ref().unwrap();
        assert_eq!(subgroups.len(), 1);
        assert_eq!(subgroups[0].name, "user");
        assert_eq!(subgroups[0].sort_key, 5);
    }

    #[test]
    fn commands_and_chains_carry_their_details() {
        let dump = structure(&sample());
        let commands = dump.commands.unwrap();
        let hello = commands.iter().find(|c| c.name == "hello").unwrap();
        assert_eq!(hello.kind, NodeKind::Command);
        assert_eq!(hello.callback.as_deref(), Some("say_hello"));
        let args: Vec<&str> = hello.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(args, vec!["alpha", "zeta"]);
        assert!(hello.subgroups.is_none());

        let both = commands.iter().find(|c| c.name == "both").unwrap();
        assert_eq!(both.kind, NodeKind::Chain);
        assert_eq!(both.help, "one ➜ two");
        let members: Vec<&str> = both
            .chained
            .as_ref()
            .unwrap()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(members, vec!["one", "two"]);
    }

    #[test]
    fn json_uses_wire_field_names() {
        let json: Json = serde_json::from_str(&structure_json(&sample()).unwrap()).unwrap();
        assert_eq!(json["type"], "cli");
        assert_eq!(json["name"], "app");
        let add = &json["subgroups"][0]["commands"][0];
        assert_eq!(add["type"], "command");
        assert_eq!(add["callback"], "add_user");
        let level = &add["options"][0];
        assert_eq!(level["dest"], "level");
        assert_eq!(level["arg_type"], "int");
        assert_eq!(level["default"], 2);
        assert_eq!(level["choices"], serde_json::json!([2, 3, 4]));
        assert_eq!(level["inherit"], true);
        assert!(add.get("subgroups").is_none());
    }

    #[test]
    fn dump_round_trips_through_metadata() {
        let text = structure_json(&sample()).unwrap();
        let parsed: NodeDump = serde_json::from_str(&text).unwrap();
        let hello = parsed
            .commands
            .unwrap()
            .into_iter()
            .find(|c| c.name == "hello")
            .unwrap();
        assert_eq!(hello.arguments[0].nargs, Some(Nargs::ZeroOrMore));
        assert_eq!(hello.arguments[1].default, None::<Value>);
    }
}
