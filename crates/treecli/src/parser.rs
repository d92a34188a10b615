//! Layered structural parser built on `clap`.
//!
//! Each tree node becomes one `clap::Command`; children are registered as
//! subcommands in `(sort_key, name)` order. A level registers the node's own
//! positionals plus every option visible there (inheritable ancestor options
//! and the node's own). Defaults and required checks are left to the
//! dispatcher so that values can be merged across levels.

use crate::cli::Cli;
use crate::error::DefinitionError;
use crate::model::Argument;
use crate::tree::{self, Node, ResolvedOpt};
use clap::builder::ValueRange;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use indexmap::IndexMap;
use tracing::{debug, trace};
use treecli_argparse::report::ParseError;
use treecli_argparse::values::TypedParser;
use treecli_metadata::{Nargs, Value};

/// One registered value slot of a level.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub dest: String,
    pub repeated: bool,
    pub is_flag: bool,
}

/// Bookkeeping mirroring the clap command tree.
#[derive(Debug, Clone, Default)]
pub(crate) struct Level {
    pub slots: Vec<Slot>,
    pub children: IndexMap<String, Level>,
}

/// Values supplied on the command line, per level, root first.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    /// Names of the selected nodes below the root.
    pub path: Vec<String>,
    pub levels: Vec<IndexMap<String, Value>>,
}

impl Parsed {
    /// Was `dest` given explicitly at any level?
    pub fn supplied(&self, dest: &str) -> bool {
        self.levels.iter().any(|level| level.contains_key(dest))
    }
}

#[derive(Debug, Clone)]
pub struct StructuralParser {
    command: clap::Command,
    root: Level,
}

impl StructuralParser {
    pub fn command(&self) -> &clap::Command {
        &self.command
    }

    pub fn parse(&mut self, tokens: &[String]) -> Result<Parsed, ParseError> {
        let matches = self
            .command
            .try_get_matches_from_mut(tokens.iter().cloned())
            .map_err(ParseError::from)?;

        let mut parsed = Parsed::default();
        let mut level = &self.root;
        let mut current = &matches;
        loop {
            parsed.levels.push(read_level(level, current));
            let Some((name, sub)) = current.subcommand() else {
                break;
            };
            let Some(child) = level.children.get(name) else {
                break;
            };
            parsed.path.push(name.to_string());
            level = child;
            current = sub;
        }
        debug!(path = ?parsed.path, "structural parse selected path");
        Ok(parsed)
    }
}

fn read_level(level: &Level, matches: &ArgMatches) -> IndexMap<String, Value> {
    let mut values = IndexMap::new();
    for slot in &level.slots {
        if matches.value_source(&slot.dest) != Some(ValueSource::CommandLine) {
            continue;
        }
        let value = if slot.is_flag {
            Value::Bool(true)
        } else {
            let mut supplied: Vec<Value> = matches
                .try_get_many::<Value>(&slot.dest)
                .ok()
                .flatten()
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default();
            if slot.repeated {
                Value::List(supplied)
            } else if supplied.is_empty() {
                Value::None
            } else {
                supplied.swap_remove(0)
            }
        };
        values.insert(slot.dest.clone(), value);
    }
    values
}

/// Build the structural parser for an already validated tree.
pub fn build(cli: &Cli) -> Result<StructuralParser, DefinitionError> {
    let root = cli.root();
    debug!(max_depth = tree::max_depth(root), "building structural parser");
    let mut ancestors = Vec::new();
    let (command, level) = build_level(root, &mut ancestors)?;
    Ok(StructuralParser {
        command: command.no_binary_name(true),
        root: level,
    })
}

fn build_level<'a>(
    node: Node<'a>,
    ancestors: &mut Vec<Node<'a>>,
) -> Result<(clap::Command, Level), DefinitionError> {
    let set = tree::level_set(ancestors, node)?;
    let mut command = clap::Command::new(node.name().to_string())
        .about(node.help().into_owned())
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .disable_version_flag(true)
        .subcommand_precedence_over_arg(true)
        .args_override_self(true);
    let mut level = Level::default();

    for arg in tree::parse_order(&set.arguments) {
        trace!(node = node.name(), dest = arg.get_dest(), "register positional");
        command = command.arg(positional(arg));
        level.slots.push(Slot {
            dest: arg.get_dest().to_string(),
            repeated: arg.is_repeated(),
            is_flag: false,
        });
    }

    for resolved in set.merged_options() {
        trace!(node = node.name(), dest = %resolved.dest, "register option");
        command = command.arg(option(resolved));
        level.slots.push(Slot {
            dest: resolved.dest.clone(),
            repeated: resolved.opt.is_repeated(),
            is_flag: resolved.opt.is_flag,
        });
    }

    ancestors.push(node);
    for child in node.children() {
        let (sub, sub_level) = build_level(child, ancestors)?;
        command = command.subcommand(sub);
        level.children.insert(child.name().to_string(), sub_level);
    }
    ancestors.pop();

    Ok((command, level))
}

fn value_range(nargs: Option<Nargs>, positional: bool) -> ValueRange {
    // Positionals are never required at the clap level, so zero values is
    // already allowed; their minimum stays at one.
    match nargs {
        None => 1.into(),
        Some(Nargs::Optional) if positional => 1.into(),
        Some(Nargs::Optional) => (0..=1).into(),
        Some(Nargs::ZeroOrMore) if positional => (1..).into(),
        Some(Nargs::ZeroOrMore) => (0..).into(),
        Some(Nargs::OneOrMore) => (1..).into(),
        Some(Nargs::Exactly(n)) => n.max(1).into(),
    }
}

fn positional(arg: &Argument) -> Arg {
    Arg::new(arg.get_dest().to_string())
        .value_name(arg.name.to_uppercase())
        .help(arg.help.clone())
        .action(ArgAction::Set)
        .num_args(value_range(arg.nargs, true))
        .allow_negative_numbers(true)
        .value_parser(TypedParser::new(arg.arg_type, arg.choices.clone()))
}

fn option(resolved: &ResolvedOpt<'_>) -> Arg {
    let opt = resolved.opt;
    let mut arg = Arg::new(resolved.dest.clone()).help(opt.help.clone());

    let mut longs = opt.flags.iter().filter_map(|f| f.strip_prefix("--"));
    let mut shorts = opt
        .flags
        .iter()
        .filter(|f| !f.starts_with("--"))
        .filter_map(|f| f.strip_prefix('-'))
        .filter_map(|s| s.chars().next());
    if let Some(long) = longs.next() {
        arg = arg.long(long.to_string());
    }
    for alias in longs {
        arg = arg.alias(alias.to_string());
    }
    if let Some(short) = shorts.next() {
        arg = arg.short(short);
    }
    for alias in shorts {
        arg = arg.short_alias(alias);
    }

    if opt.is_flag {
        return arg.action(ArgAction::SetTrue);
    }
    arg.action(ArgAction::Set)
        .value_name(resolved.dest.to_uppercase())
        .num_args(value_range(opt.nargs, false))
        .allow_negative_numbers(true)
        .value_parser(TypedParser::new(opt.arg_type, opt.choices.clone()))
}
