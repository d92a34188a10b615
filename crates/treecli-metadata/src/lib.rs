//! Shared value model for treecli command trees.
//!
//! This crate intentionally does **not** depend on the parser or the
//! renderer. The types here are used for:
//! - typed values flowing from parsed input into callbacks
//! - the machine-readable structure dump printed for `--json`

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Semantic type tag of an argument or option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed (or declared default) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    None,
}

impl Value {
    /// The scalar type tag of this value, if it is a scalar.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Int(_) => Some(ValueType::Int),
            Self::Float(_) => Some(ValueType::Float),
            Self::Str(_) => Some(ValueType::Str),
            Self::List(_) | Self::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::None => f.write_str("none"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Repetition count of an argument or option.
///
/// Serialized as `"?"`, `"*"`, `"+"` or a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nargs {
    /// Zero or one value.
    Optional,
    /// Zero or more values.
    ZeroOrMore,
    /// One or more values.
    OneOrMore,
    /// Exactly `n` values.
    Exactly(usize),
}

impl Nargs {
    /// Whether the value is delivered as a sequence.
    pub fn is_repeated(self) -> bool {
        match self {
            Self::ZeroOrMore | Self::OneOrMore => true,
            Self::Exactly(n) => n > 1,
            Self::Optional => false,
        }
    }

    /// Minimum and maximum number of values accepted.
    pub fn bounds(self) -> (usize, Option<usize>) {
        match self {
            Self::Optional => (0, Some(1)),
            Self::ZeroOrMore => (0, None),
            Self::OneOrMore => (1, None),
            Self::Exactly(n) => (n, Some(n)),
        }
    }
}

impl fmt::Display for Nargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optional => f.write_str("?"),
            Self::ZeroOrMore => f.write_str("*"),
            Self::OneOrMore => f.write_str("+"),
            Self::Exactly(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Nargs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exactly(n) => serializer.serialize_u64(*n as u64),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Nargs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Symbol(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(Self::Exactly(n)),
            Raw::Symbol(s) => match s.as_str() {
                "?" => Ok(Self::Optional),
                "*" => Ok(Self::ZeroOrMore),
                "+" => Ok(Self::OneOrMore),
                other => Err(de::Error::custom(format!("invalid nargs: {other}"))),
            },
        }
    }
}

/// Kind tag of a node in the structure dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Cli,
    Group,
    Command,
    Chain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentDump {
    pub name: String,
    #[serde(default)]
    pub dest: Option<String>,
    pub arg_type: ValueType,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub nargs: Option<Nargs>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub sort_key: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDump {
    pub flags: Vec<String>,
    pub dest: String,
    pub arg_type: ValueType,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub nargs: Option<Nargs>,
    #[serde(default)]
    pub choices: Option<Vec<Value>>,
    #[serde(default)]
    pub sort_key: i32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub is_flag: bool,
}

/// One node of the `--json` structure dump.
///
/// `subgroups`/`commands` are present for the root and groups, `chained`
/// for chains and `callback` for commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDump {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub sort_key: i32,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub options: Vec<OptionDump>,
    #[serde(default)]
    pub arguments: Vec<ArgumentDump>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained: Option<Vec<NodeDump>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroups: Option<Vec<NodeDump>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<NodeDump>>,
}

impl NodeDump {
    /// Encode as indented JSON for terminal output.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
