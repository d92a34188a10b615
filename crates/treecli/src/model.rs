//! Command tree entities.
//!
//! Everything here is plain data assembled by the caller through builder
//! methods. The library only reads it.

use crate::callback::{Callback, ParamType};
use crate::error::DefinitionError;
use std::cell::OnceCell;
use treecli_metadata::{Nargs, Value, ValueType};

/// A positional parameter.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: String,
    pub dest: Option<String>,
    pub arg_type: ValueType,
    pub help: String,
    /// `None` means exactly one value.
    pub nargs: Option<Nargs>,
    pub default: Option<Value>,
    pub choices: Option<Vec<Value>>,
    pub sort_key: i32,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dest: None,
            arg_type: ValueType::Str,
            help: String::new(),
            nargs: None,
            default: None,
            choices: None,
            sort_key: 0,
        }
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn arg_type(mut self, ty: ValueType) -> Self {
        self.arg_type = ty;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Some(nargs);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort_key(mut self, key: i32) -> Self {
        self.sort_key = key;
        self
    }

    /// Destination keyword: explicit `dest`, else the name.
    pub fn get_dest(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.name)
    }

    pub fn is_repeated(&self) -> bool {
        self.nargs.is_some_and(Nargs::is_repeated)
    }

    /// Type a callback parameter must declare to receive this argument.
    pub fn derived_type(&self) -> ParamType {
        if self.is_repeated() {
            ParamType::List(self.arg_type)
        } else {
            ParamType::Scalar(self.arg_type)
        }
    }

    /// Minimum number of values the command line must supply.
    pub fn min_values(&self) -> usize {
        self.nargs.map_or(1, |n| n.bounds().0)
    }
}

/// A named flag.
#[derive(Debug, Clone)]
pub struct Opt {
    pub flags: Vec<String>,
    pub dest: Option<String>,
    pub arg_type: ValueType,
    pub help: String,
    pub default: Option<Value>,
    pub nargs: Option<Nargs>,
    pub choices: Option<Vec<Value>>,
    pub sort_key: i32,
    pub required: bool,
    /// Whether descendant commands receive this option.
    pub inherit: bool,
    /// Store-true option taking no value.
    pub is_flag: bool,
}

impl Opt {
    pub fn new<S: Into<String>>(flags: impl IntoIterator<Item = S>) -> Self {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
            dest: None,
            arg_type: ValueType::Str,
            help: String::new(),
            default: None,
            nargs: None,
            choices: None,
            sort_key: 0,
            required: false,
            inherit: true,
            is_flag: false,
        }
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn arg_type(mut self, ty: ValueType) -> Self {
        self.arg_type = ty;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Some(nargs);
        self
    }

    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort_key(mut self, key: i32) -> Self {
        self.sort_key = key;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Make this a store-true flag of type bool.
    pub fn flag(mut self) -> Self {
        self.is_flag = true;
        self.arg_type = ValueType::Bool;
        self
    }

    /// Destination keyword.
    ///
    /// An explicit `dest` always wins. Otherwise the first long flag, else
    /// the first flag, stripped of leading dashes with inner dashes turned
    /// into underscores. `None` when there are no flags to derive from.
    pub fn get_dest(&self) -> Option<String> {
        if let Some(dest) = &self.dest {
            return Some(dest.clone());
        }
        let flag = self
            .flags
            .iter()
            .find(|f| f.starts_with("--"))
            .or_else(|| self.flags.first())?;
        Some(flag.trim_start_matches('-').replace('-', "_"))
    }

    pub fn is_repeated(&self) -> bool {
        !self.is_flag && self.nargs.is_some_and(Nargs::is_repeated)
    }

    pub fn derived_type(&self) -> ParamType {
        if self.is_flag {
            ParamType::Scalar(ValueType::Bool)
        } else if self.is_repeated() {
            ParamType::List(self.arg_type)
        } else {
            ParamType::Scalar(self.arg_type)
        }
    }

    /// Flags ordered longest first, for display.
    pub fn display_flags(&self) -> Vec<&str> {
        let mut flags: Vec<&str> = self.flags.iter().map(String::as_str).collect();
        flags.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        flags
    }

    pub(crate) fn first_flag(&self) -> &str {
        self.flags.first().map(String::as_str).unwrap_or_default()
    }
}

/// A leaf invocation unit.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub help: String,
    pub callback: Callback,
    pub arguments: Vec<Argument>,
    pub options: Vec<Opt>,
    pub sort_key: i32,
}

impl Command {
    pub fn new(name: impl Into<String>, callback: Callback) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            callback,
            arguments: Vec::new(),
            options: Vec::new(),
            sort_key: 0,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn argument(mut self, arg: Argument) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn option(mut self, opt: Opt) -> Self {
        self.options.push(opt);
        self
    }

    pub fn sort_key(mut self, key: i32) -> Self {
        self.sort_key = key;
        self
    }
}

/// Member arguments and options of a chain, concatenated in member order.
#[derive(Debug, Clone)]
pub struct ChainSet {
    pub arguments: Vec<Argument>,
    pub options: Vec<Opt>,
}

/// A composite leaf running several commands in sequence.
#[derive(Debug, Clone)]
pub struct Chain {
    pub name: String,
    help: String,
    pub commands: Vec<Command>,
    pub sort_key: i32,
    effective: OnceCell<Result<ChainSet, DefinitionError>>,
}

impl Chain {
    pub fn new(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            commands,
            sort_key: 0,
            effective: OnceCell::new(),
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn sort_key(mut self, key: i32) -> Self {
        self.sort_key = key;
        self
    }

    /// Help text, defaulting to the member names joined by arrows.
    pub fn help_text(&self) -> String {
        if self.help.is_empty() {
            self.commands
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(" ➜ ")
        } else {
            self.help.clone()
        }
    }

    /// Member arguments and options, computed on first access.
    ///
    /// Fails if two members expose the same destination.
    pub fn effective(&self) -> Result<&ChainSet, DefinitionError> {
        self.effective
            .get_or_init(|| self.collect_members())
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn effective_arguments(&self) -> Result<&[Argument], DefinitionError> {
        Ok(&self.effective()?.arguments)
    }

    pub fn effective_options(&self) -> Result<&[Opt], DefinitionError> {
        Ok(&self.effective()?.options)
    }

    fn collect_members(&self) -> Result<ChainSet, DefinitionError> {
        let mut arguments = Vec::new();
        let mut options: Vec<Opt> = Vec::new();
        let mut arg_dests: Vec<&str> = Vec::new();
        let mut opt_dests: Vec<String> = Vec::new();

        for cmd in &self.commands {
            for arg in &cmd.arguments {
                let dest = arg.get_dest();
                if arg_dests.contains(&dest) {
                    return Err(DefinitionError::ChainConflict {
                        chain: self.name.clone(),
                        what: "argument",
                        dest: dest.to_string(),
                    });
                }
                arg_dests.push(dest);
                arguments.push(arg.clone());
            }
            for opt in &cmd.options {
                let dest = opt.get_dest().ok_or_else(|| DefinitionError::NoFlags {
                    node: cmd.name.clone(),
                })?;
                if opt_dests.contains(&dest) {
                    return Err(DefinitionError::ChainConflict {
                        chain: self.name.clone(),
                        what: "option",
                        dest,
                    });
                }
                opt_dests.push(dest);
                options.push(opt.clone());
            }
        }

        Ok(ChainSet { arguments, options })
    }
}

/// A terminal node under a group.
#[derive(Debug, Clone)]
pub enum Leaf {
    Command(Command),
    Chain(Chain),
}

impl From<Command> for Leaf {
    fn from(cmd: Command) -> Self {
        Leaf::Command(cmd)
    }
}

impl From<Chain> for Leaf {
    fn from(chain: Chain) -> Self {
        Leaf::Chain(chain)
    }
}

/// An internal tree node.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub help: String,
    pub subgroups: Vec<Group>,
    pub commands: Vec<Leaf>,
    pub arguments: Vec<Argument>,
    pub options: Vec<Opt>,
    pub sort_key: i32,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.subgroups.push(group);
        self
    }

    pub fn command(mut self, cmd: Command) -> Self {
        self.commands.push(Leaf::Command(cmd));
        self
    }

    pub fn chain(mut self, chain: Chain) -> Self {
        self.commands.push(Leaf::Chain(chain));
        self
    }

    pub fn argument(mut self, arg: Argument) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn option(mut self, opt: Opt) -> Self {
        self.options.push(opt);
        self
    }

    pub fn sort_key(mut self, key: i32) -> Self {
        self.sort_key = key;
        self
    }
}
