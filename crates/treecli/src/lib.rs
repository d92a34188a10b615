//! Declarative command trees on top of `clap`.
//!
//! A tree is built from [`Group`]s, [`Command`]s and [`Chain`]s. Arguments
//! and options declared on a group are inherited by everything below it,
//! every callback declares the keyword parameters it expects, and the whole
//! tree is checked against those signatures before any input is parsed.
//!
//! ```no_run
//! use treecli::{Argument, Callback, Cli, Command, Group, ValueType};
//!
//! let greet = Callback::new("greet", |kw| {
//!     println!("hello {}", kw.get::<String>("name")?);
//!     Ok(())
//! })
//! .param("name", ValueType::Str);
//!
//! let cli = Cli::new("app").group(
//!     Group::new("user").command(Command::new("greet", greet).argument(Argument::new("name"))),
//! );
//! let code = cli.run()?;
//! # let _ = code;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Two flags are reserved at every level: `--help`/`-h` prints tree help
//! for the deepest valid prefix of the given path, and `--json`/`-j` prints
//! the structure of the whole tree as JSON.

mod callback;
mod cli;
mod config;
mod dispatch;
mod dump;
mod error;
mod help;
mod model;
mod parser;
mod style;
mod tree;
mod validate;

pub use callback::{Callback, FromValue, Kwargs, Param, ParamType};
pub use cli::Cli;
pub use config::DefaultOverlay;
pub use dispatch::Outcome;
pub use dump::{structure, structure_json};
pub use error::{
    ConfigError, DefinitionError, DefinitionErrors, KwargError, PathError, RunError, TypeMismatch,
};
pub use help::{HelpPath, HelpRenderer, help_path, render_error, wrap};
pub use model::{Argument, Chain, ChainSet, Command, Group, Leaf, Opt};
pub use parser::{Parsed, StructuralParser, build as build_parser};
pub use style::{ColorChoice, ColorConfig, ColorTheme, Painter, StyleTag, parse_style};
pub use tree::{EffectiveSet, Node, ResolvedOpt, effective_set, max_depth, resolve_path};
pub use validate::validate;

pub use treecli_argparse::report::{ParseError, ParseErrorKind};
pub use treecli_metadata::{Nargs, NodeKind, Value, ValueType};

/// Flags that render help instead of running a command.
pub const HELP_FLAGS: [&str; 2] = ["--help", "-h"];

/// Flags that print the tree structure as JSON.
pub const JSON_FLAGS: [&str; 2] = ["--json", "-j"];
