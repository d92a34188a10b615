//! Whole-tree definition checks, run before any input is parsed.
//!
//! Every problem is collected; nothing stops at the first one.

use crate::callback::{Callback, ParamType};
use crate::cli::Cli;
use crate::error::{DefinitionError, DefinitionErrors, TypeMismatch};
use crate::model::{Argument, Opt};
use crate::tree::{self, EffectiveSet, Node};
use crate::{HELP_FLAGS, JSON_FLAGS};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use treecli_argparse::values::{conform, conform_choices};
use treecli_metadata::{Value, ValueType};

pub fn validate(cli: &Cli) -> Result<(), DefinitionErrors> {
    let mut errors = Vec::new();
    let mut ancestors = Vec::new();
    walk(cli.root(), &mut ancestors, &mut errors);
    debug!(errors = errors.len(), "validated command tree");
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DefinitionErrors(errors))
    }
}

fn push(errors: &mut Vec<DefinitionError>, err: DefinitionError) {
    if !errors.contains(&err) {
        errors.push(err);
    }
}

fn walk<'a>(node: Node<'a>, ancestors: &mut Vec<Node<'a>>, errors: &mut Vec<DefinitionError>) {
    match node {
        Node::Root(group) | Node::Group(group) => {
            check_declarations(&group.name, &group.arguments, &group.options, errors);
            check_siblings(node, errors);
            check_level(ancestors, node, errors);
            ancestors.push(node);
            for child in node.children() {
                walk(child, ancestors, errors);
            }
            ancestors.pop();
        }
        Node::Command(cmd) => {
            check_declarations(&cmd.name, &cmd.arguments, &cmd.options, errors);
            match tree::compose(ancestors, &cmd.name, &cmd.arguments, &cmd.options) {
                Ok(set) => {
                    check_effective(&cmd.name, &set, errors);
                    let provided = set.destinations();
                    let owned = provided.keys().cloned().collect();
                    check_signature(&cmd.name, &cmd.callback, &provided, &owned, errors);
                }
                Err(err) => push(errors, err),
            }
            check_level(ancestors, node, errors);
        }
        Node::Chain(chain) => {
            if chain.commands.is_empty() {
                push(
                    errors,
                    DefinitionError::EmptyChain {
                        chain: chain.name.clone(),
                    },
                );
                return;
            }
            for member in &chain.commands {
                check_declarations(&member.name, &member.arguments, &member.options, errors);
                // A member must take everything it declares itself, and may
                // also ask for anything inherited into the chain.
                let own = tree::compose(&[], &member.name, &member.arguments, &member.options);
                let reachable =
                    tree::compose(ancestors, &member.name, &member.arguments, &member.options);
                match (own, reachable) {
                    (Ok(own), Ok(reachable)) => {
                        let owned = own.destinations().keys().cloned().collect();
                        let provided = reachable.destinations();
                        check_signature(&member.name, &member.callback, &provided, &owned, errors);
                    }
                    (Err(err), _) | (_, Err(err)) => push(errors, err),
                }
            }
            match tree::effective_set(ancestors, node) {
                Ok(set) => {
                    check_effective(&chain.name, &set, errors);
                    check_level(ancestors, node, errors);
                }
                Err(err) => push(errors, err),
            }
        }
    }
}

/// Checks that need only the node's own declarations.
fn check_declarations(
    node: &str,
    arguments: &[Argument],
    options: &[Opt],
    errors: &mut Vec<DefinitionError>,
) {
    for arg in arguments {
        check_default(
            node,
            format!("argument '{}'", arg.name),
            arg.arg_type,
            arg.default.as_ref(),
            arg.choices.as_deref(),
            arg.is_repeated(),
            errors,
        );
    }

    for opt in options {
        if opt.flags.is_empty() {
            push(
                errors,
                DefinitionError::NoFlags {
                    node: node.to_string(),
                },
            );
        }
        for flag in &opt.flags {
            if HELP_FLAGS.contains(&flag.as_str()) || JSON_FLAGS.contains(&flag.as_str()) {
                push(
                    errors,
                    DefinitionError::ReservedFlag {
                        node: node.to_string(),
                        flag: flag.clone(),
                    },
                );
            } else if !is_well_formed(flag) {
                push(
                    errors,
                    DefinitionError::MalformedFlag {
                        node: node.to_string(),
                        flag: flag.clone(),
                    },
                );
            }
        }
        if opt.is_flag && opt.choices.is_some() {
            push(
                errors,
                DefinitionError::ChoicesOnFlag {
                    node: node.to_string(),
                    flag: opt.first_flag().to_string(),
                },
            );
            continue;
        }
        check_default(
            node,
            format!("option '{}'", opt.first_flag()),
            opt.arg_type,
            opt.default.as_ref(),
            opt.choices.as_deref(),
            opt.is_repeated(),
            errors,
        );
    }
}

/// Choices must convert to the declared type; a default must be one of them.
fn check_default(
    node: &str,
    target: String,
    ty: ValueType,
    default: Option<&Value>,
    choices: Option<&[Value]>,
    repeated: bool,
    errors: &mut Vec<DefinitionError>,
) {
    let Some(choices) = choices else {
        return;
    };
    for choice in choices {
        if conform(ty, choice).is_err() {
            push(
                errors,
                DefinitionError::ChoiceType {
                    node: node.to_string(),
                    target: target.clone(),
                    choice: choice.to_string(),
                    ty,
                },
            );
        }
    }
    let Some(default) = default else {
        return;
    };
    let typed = conform_choices(ty, choices);
    let candidates: Vec<&Value> = match default {
        Value::None => Vec::new(),
        Value::List(items) if repeated => items.iter().collect(),
        other => vec![other],
    };
    for value in candidates {
        let value_matches = match conform(ty, value) {
            Ok(converted) => typed.contains(&converted),
            Err(_) => choices.contains(value),
        };
        if !value_matches {
            push(
                errors,
                DefinitionError::DefaultNotInChoices {
                    node: node.to_string(),
                    target: target.clone(),
                    default: value.to_string(),
                    choices: Value::List(choices.to_vec()).to_string(),
                },
            );
        }
    }
}

fn is_well_formed(flag: &str) -> bool {
    if let Some(long) = flag.strip_prefix("--") {
        let mut chars = long.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphanumeric())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    } else if let Some(short) = flag.strip_prefix('-') {
        let mut chars = short.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphanumeric())
    } else {
        false
    }
}

fn check_siblings(node: Node<'_>, errors: &mut Vec<DefinitionError>) {
    let mut seen = BTreeSet::new();
    for child in node.declared_children() {
        if !seen.insert(child.name()) {
            push(
                errors,
                DefinitionError::DuplicateName {
                    parent: node.name().to_string(),
                    name: child.name().to_string(),
                },
            );
        }
    }
}

/// Conflicts within what a single parser level registers.
fn check_level<'a>(ancestors: &[Node<'a>], node: Node<'a>, errors: &mut Vec<DefinitionError>) {
    let level = match tree::level_set(ancestors, node) {
        Ok(level) => level,
        Err(err) => {
            push(errors, err);
            return;
        }
    };
    let name = node.name();

    let positionals = tree::parse_order(&level.arguments);
    if let Some((_, init)) = positionals.split_last() {
        for arg in init.iter().filter(|a| a.is_repeated()) {
            push(
                errors,
                DefinitionError::PositionalOrder {
                    node: name.to_string(),
                    name: arg.name.clone(),
                },
            );
        }
    }

    let mut flag_owner: BTreeMap<&str, &str> = BTreeMap::new();
    for resolved in level.merged_options() {
        for flag in &resolved.opt.flags {
            match flag_owner.get(flag.as_str()) {
                Some(owner) if *owner != resolved.dest => push(
                    errors,
                    DefinitionError::FlagCollision {
                        node: name.to_string(),
                        flag: flag.clone(),
                        first: owner.to_string(),
                        second: resolved.dest.clone(),
                    },
                ),
                _ => {
                    flag_owner.insert(flag.as_str(), resolved.dest.as_str());
                }
            }
        }
    }

    check_effective(name, &level, errors);
}

/// No destination may be shared by two arguments, or by an argument and an option.
fn check_effective(node: &str, set: &EffectiveSet<'_>, errors: &mut Vec<DefinitionError>) {
    let option_dests: BTreeSet<&str> = set.options.iter().map(|o| o.dest.as_str()).collect();
    let mut arg_dests = BTreeSet::new();
    for arg in &set.arguments {
        let dest = arg.get_dest();
        if !arg_dests.insert(dest) || option_dests.contains(dest) {
            push(
                errors,
                DefinitionError::DuplicateDestination {
                    node: node.to_string(),
                    dest: dest.to_string(),
                },
            );
        }
    }
}

/// `provided` is every destination the callback may receive, `owned` the
/// ones it must accept.
fn check_signature(
    command: &str,
    callback: &Callback,
    provided: &IndexMap<String, ParamType>,
    owned: &BTreeSet<String>,
    errors: &mut Vec<DefinitionError>,
) {
    let wanted: BTreeSet<String> = callback.params().iter().map(|p| p.name.clone()).collect();

    let missing: BTreeSet<String> = wanted
        .iter()
        .filter(|name| !provided.contains_key(name.as_str()))
        .cloned()
        .collect();
    let extra: BTreeSet<String> = owned.difference(&wanted).cloned().collect();
    if !missing.is_empty() || !extra.is_empty() {
        push(
            errors,
            DefinitionError::NameMismatch {
                command: command.to_string(),
                missing,
                extra,
            },
        );
    }

    let mut mismatches = Vec::new();
    for param in callback.params() {
        let (Some(declared), Some(cli)) = (param.ty, provided.get(&param.name)) else {
            continue;
        };
        if !declared.accepts(*cli) {
            mismatches.push(TypeMismatch {
                param: param.name.clone(),
                callback: declared.to_string(),
                cli: cli.to_string(),
            });
        }
    }
    if !mismatches.is_empty() {
        push(
            errors,
            DefinitionError::TypeMismatch {
                command: command.to_string(),
                mismatches,
            },
        );
    }
}
