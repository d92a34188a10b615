//! Option default overrides loaded from a key-value file.
//!
//! The file maps option destinations to values. `.json` files are read with
//! `serde_json`, `.yaml`/`.yml` with `serde_yaml`, anything else as TOML.
//! The result is a pure overlay; option definitions are never modified.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::model::Opt;
use crate::tree::Node;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use treecli_argparse::values::{conform, conform_choices};
use treecli_metadata::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultOverlay {
    values: BTreeMap<String, Value>,
}

impl DefaultOverlay {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the overlay configured on `cli`, or an empty one.
    pub fn for_cli(cli: &Cli) -> Result<Self, ConfigError> {
        match cli.get_config_file() {
            Some(path) => Self::load(path, cli),
            None => Ok(Self::empty()),
        }
    }

    pub fn load(path: &Path, cli: &Cli) -> Result<Self, ConfigError> {
        let raw = read_mapping(path)?;
        let overlay = Self::from_mapping(raw, cli)?;
        debug!(path = %path.display(), keys = overlay.values.len(), "loaded default overrides");
        Ok(overlay)
    }

    /// Coerce raw values against every option sharing each key's destination.
    pub fn from_mapping(raw: BTreeMap<String, Value>, cli: &Cli) -> Result<Self, ConfigError> {
        let mut by_dest: BTreeMap<String, Vec<&Opt>> = BTreeMap::new();
        collect_options(cli.root(), &mut by_dest);

        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let Some(opts) = by_dest.get(&key) else {
                warn!(key = %key, "config key does not name any option; ignoring");
                continue;
            };
            let mut coerced = None;
            for opt in opts {
                let candidate = coerce_for(opt, &value).map_err(|reason| ConfigError::InvalidValue {
                    key: key.clone(),
                    reason,
                })?;
                coerced.get_or_insert(candidate);
            }
            if let Some(coerced) = coerced {
                values.insert(key, coerced);
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.values.get(dest)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Effective default of `opt`: the override if present, else its declaration.
    pub fn default_for<'a>(&'a self, dest: &str, opt: &'a Opt) -> Option<&'a Value> {
        self.get(dest).or(opt.default.as_ref())
    }
}

fn read_mapping(path: &Path) -> Result<BTreeMap<String, Value>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::Missing(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let parsed = match ext.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        _ => toml::from_str(&content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| ConfigError::Malformed {
        path: path.to_path_buf(),
        reason,
    })
}

fn collect_options<'a>(node: Node<'a>, by_dest: &mut BTreeMap<String, Vec<&'a Opt>>) {
    let opts: &[Opt] = match node {
        Node::Root(g) | Node::Group(g) => &g.options,
        Node::Command(c) => &c.options,
        Node::Chain(c) => {
            for member in &c.commands {
                collect_options(Node::Command(member), by_dest);
            }
            &[]
        }
    };
    for opt in opts {
        if let Some(dest) = opt.get_dest() {
            by_dest.entry(dest).or_default().push(opt);
        }
    }
    for child in node.declared_children() {
        collect_options(child, by_dest);
    }
}

fn coerce_for(opt: &Opt, value: &Value) -> Result<Value, String> {
    let value = match value {
        Value::List(_) | Value::None => value.clone(),
        scalar if opt.is_repeated() => Value::List(vec![scalar.clone()]),
        scalar => scalar.clone(),
    };
    if matches!(value, Value::List(_)) && !opt.is_repeated() {
        return Err(format!("expected a single {} value", opt.arg_type));
    }
    let coerced = conform(opt.arg_type, &value)?;

    if let Some(choices) = &opt.choices {
        let choices = conform_choices(opt.arg_type, choices);
        let items: Vec<&Value> = match &coerced {
            Value::List(items) => items.iter().collect(),
            Value::None => Vec::new(),
            other => vec![other],
        };
        for item in items {
            if !choices.contains(item) {
                return Err(format!(
                    "{item} not in choices {}",
                    Value::List(choices)
                ));
            }
        }
    }
    Ok(coerced)
}
