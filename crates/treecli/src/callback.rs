//! Callbacks with explicitly declared parameter signatures.
//!
//! A callback is queried for `(name, optional type)` pairs by the signature
//! validator and invoked with an ordered keyword-argument map by the
//! dispatcher.

use crate::error::KwargError;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use treecli_metadata::{Value, ValueType};

/// Declared type of a callback parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Scalar(ValueType),
    List(ValueType),
    /// A sequence of unspecified element type; accepts any `List(_)`.
    AnyList,
}

impl ParamType {
    /// Whether a parameter declared as `self` accepts values the CLI derives as `cli`.
    pub fn accepts(self, cli: ParamType) -> bool {
        match (self, cli) {
            (ParamType::AnyList, ParamType::List(_) | ParamType::AnyList) => true,
            (ParamType::List(_), ParamType::AnyList) => true,
            (a, b) => a == b,
        }
    }
}

impl From<ValueType> for ParamType {
    fn from(ty: ValueType) -> Self {
        ParamType::Scalar(ty)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Scalar(ty) => write!(f, "{ty}"),
            ParamType::List(ty) => write!(f, "list[{ty}]"),
            ParamType::AnyList => f.write_str("list"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// `None` exempts the parameter from the type check.
    pub ty: Option<ParamType>,
}

type CallbackFn = dyn Fn(&Kwargs) -> anyhow::Result<()>;

/// A named function plus the parameters it expects.
#[derive(Clone)]
pub struct Callback {
    name: String,
    params: Vec<Param>,
    func: Rc<CallbackFn>,
}

impl Callback {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Kwargs) -> anyhow::Result<()> + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            func: Rc::new(func),
        }
    }

    /// Declare a typed parameter.
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<ParamType>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: Some(ty.into()),
        });
        self
    }

    /// Declare a parameter without a type annotation.
    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: None,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn accepts_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    pub fn call(&self, kwargs: &Kwargs) -> anyhow::Result<()> {
        (self.func)(kwargs)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Conversion from a parsed [`Value`] into a Rust type.
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;

    /// Value used when the keyword is absent altogether.
    fn from_missing() -> Option<Self> {
        None
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const EXPECTED: &'static str = "list";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_list()?.iter().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::None => Some(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_missing() -> Option<Self> {
        Some(None)
    }
}

/// Keyword arguments handed to a callback, in effective declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    values: IndexMap<String, Value>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get<T: FromValue>(&self, name: &str) -> Result<T, KwargError> {
        match self.values.get(name) {
            Some(value) => T::from_value(value).ok_or_else(|| KwargError::Type {
                name: name.to_string(),
                expected: T::EXPECTED,
                found: value.to_string(),
            }),
            None => T::from_missing().ok_or_else(|| KwargError::Missing(name.to_string())),
        }
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The subset of keywords `callback` declares, in this map's order.
    pub fn subset_for(&self, callback: &Callback) -> Kwargs {
        let values = self
            .values
            .iter()
            .filter(|(k, _)| callback.accepts_param(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Kwargs { values }
    }
}

impl FromIterator<(String, Value)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Kwargs {
            values: iter.into_iter().collect(),
        }
    }
}
