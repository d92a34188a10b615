use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use treecli_argparse::report::ParseError;
use treecli_metadata::ValueType;

/// A mistake in the command tree itself, found before any input is parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error(
        "Parameter name mismatch for command '{command}': {}",
        describe_names(.missing, .extra)
    )]
    NameMismatch {
        command: String,
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },

    #[error(
        "Parameter type mismatch for command '{command}': {}",
        describe_types(.mismatches)
    )]
    TypeMismatch {
        command: String,
        mismatches: Vec<TypeMismatch>,
    },

    #[error("Default value {default} not in choices {choices} for {target} in '{node}'")]
    DefaultNotInChoices {
        node: String,
        target: String,
        default: String,
        choices: String,
    },

    #[error("Choice {choice} is not a valid {ty} for {target} in '{node}'")]
    ChoiceType {
        node: String,
        target: String,
        choice: String,
        ty: ValueType,
    },

    #[error("Choices not applicable for flag option '{flag}' in '{node}'")]
    ChoicesOnFlag { node: String, flag: String },

    #[error("Option without flags in '{node}' cannot be registered")]
    NoFlags { node: String },

    #[error("Malformed flag '{flag}' in '{node}' (expected --long or a single-character -s)")]
    MalformedFlag { node: String, flag: String },

    #[error("Flag '{flag}' in '{node}' is reserved")]
    ReservedFlag { node: String, flag: String },

    #[error("Conflicting {what} dest '{dest}' in chain '{chain}'")]
    ChainConflict {
        chain: String,
        what: &'static str,
        dest: String,
    },

    #[error("Chain '{chain}' has no commands")]
    EmptyChain { chain: String },

    #[error("Duplicate name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    #[error("Flag '{flag}' is used by both '{first}' and '{second}' in '{node}'")]
    FlagCollision {
        node: String,
        flag: String,
        first: String,
        second: String,
    },

    #[error("Destination '{dest}' is declared more than once in '{node}'")]
    DuplicateDestination { node: String, dest: String },

    #[error("Repeated positional '{name}' must be the last positional of '{node}'")]
    PositionalOrder { node: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub param: String,
    pub callback: String,
    pub cli: String,
}

fn describe_set(names: &BTreeSet<String>) -> String {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    format!("[{}]", names.join(", "))
}

fn describe_names(missing: &BTreeSet<String>, extra: &BTreeSet<String>) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!(
            "missing in CLI definition: {}",
            describe_set(missing)
        ));
    }
    if !extra.is_empty() {
        parts.push(format!("extra in CLI definition: {}", describe_set(extra)));
    }
    parts.join("; ")
}

fn describe_types(mismatches: &[TypeMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("{}: callback {} vs CLI {}", m.param, m.callback, m.cli))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every definition error found in one validation pass, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionErrors(pub Vec<DefinitionError>);

impl DefinitionErrors {
    pub fn iter(&self) -> impl Iterator<Item = &DefinitionError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DefinitionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DefinitionErrors {}

impl From<DefinitionError> for DefinitionErrors {
    fn from(err: DefinitionError) -> Self {
        Self(vec![err])
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path not found: '{segment}' in [{}]", .path.join(", "))]
    NotFound { segment: String, path: Vec<String> },
}

impl From<PathError> for ParseError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::NotFound { segment, path } => ParseError::path_not_found(&segment, &path),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    Missing(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Typed extraction from a callback's keyword arguments failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KwargError {
    #[error("missing keyword argument '{0}'")]
    Missing(String),

    #[error("keyword argument '{name}' is not a {expected}: {found}")]
    Type {
        name: String,
        expected: &'static str,
        found: String,
    },
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{0}")]
    Definition(#[from] DefinitionErrors),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Callback(anyhow::Error),
}

impl RunError {
    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Parse(_) => 2,
            RunError::Definition(_) | RunError::Config(_) | RunError::Callback(_) => 1,
        }
    }
}

impl From<DefinitionError> for RunError {
    fn from(err: DefinitionError) -> Self {
        RunError::Definition(err.into())
    }
}

impl From<PathError> for RunError {
    fn from(err: PathError) -> Self {
        RunError::Parse(err.into())
    }
}
