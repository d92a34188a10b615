//! Token scanning, typed value coercion and error reporting on top of `clap`.
//!
//! `clap` does the actual tokenizing and subcommand dispatch. This crate
//! supplies the pieces treecli layers over it:
//! - `args`: raw argv scanning for reserved flags, usable before (and even
//!   without) a successful structural parse
//! - `values`: typed coercion with closed choice sets
//! - `report`: one error type for everything the user typed wrong

pub mod args {
    /// Declare which flags take a value in the *next* argument (e.g. `--output out.txt`).
    ///
    /// Without a schema, scanning cannot reliably distinguish between:
    /// - a boolean flag followed by a positional (`--verbose file.txt`)
    /// - a value flag followed by its value (`--output out.txt`)
    #[derive(Debug, Clone, Default)]
    pub struct Schema {
        value_flags: Vec<String>,
    }

    impl Schema {
        /// Create an empty schema.
        pub fn new() -> Self {
            Self::default()
        }

        /// Declare a flag that takes a value (e.g. `--output`, `-o`).
        pub fn value_flag(mut self, name: impl Into<String>) -> Self {
            let name = name.into();
            if !self.value_flags.iter().any(|s| s == &name) {
                self.value_flags.push(name);
            }
            self
        }

        pub fn takes_value(&self, flag: &str) -> bool {
            self.value_flags.iter().any(|s| s == flag)
        }
    }

    /// Argument name collection for flag matching.
    pub trait FlagNames<'a> {
        type Iter: Iterator<Item = &'a str>;
        fn iter(self) -> Self::Iter;
    }

    impl<'a> FlagNames<'a> for &'a str {
        type Iter = std::iter::Once<&'a str>;

        fn iter(self) -> Self::Iter {
            std::iter::once(self)
        }
    }

    impl<'a> FlagNames<'a> for &'a [&'a str] {
        type Iter = std::iter::Copied<std::slice::Iter<'a, &'a str>>;

        fn iter(self) -> Self::Iter {
            self.iter().copied()
        }
    }

    impl<'a, const N: usize> FlagNames<'a> for [&'a str; N] {
        type Iter = std::array::IntoIter<&'a str, N>;

        fn iter(self) -> Self::Iter {
            self.into_iter()
        }
    }

    /// Check if a flag like `--help` exists.
    ///
    /// Accepts a single name or multiple names via array/slice.
    /// Scanning stops at `--`.
    pub fn flag<'a, N>(argv: &[String], names: N) -> bool
    where
        N: FlagNames<'a>,
    {
        let names: Vec<&str> = names.iter().collect();
        for arg in argv {
            if arg == "--" {
                break;
            }
            if names.iter().any(|name| arg == name) {
                return true;
            }
        }
        false
    }

    /// The tokens preceding the first occurrence of any of `names`.
    ///
    /// Returns all of `argv` if none of the names occur before `--`.
    pub fn tokens_before<'a, 'n, N>(argv: &'a [String], names: N) -> &'a [String]
    where
        N: FlagNames<'n>,
    {
        let names: Vec<&str> = names.iter().collect();
        for (idx, arg) in argv.iter().enumerate() {
            if arg == "--" {
                return &argv[..idx];
            }
            if names.iter().any(|name| arg == name) {
                return &argv[..idx];
            }
        }
        argv
    }

    /// Index of the first positional token, using a schema to skip values of
    /// declared flags.
    ///
    /// Any flag listed in `schema` is treated as taking a value in the next
    /// argument (e.g. `--output out.txt`), and that value is skipped.
    /// `--key=value` is a single flag token. The token after `--` is positional.
    ///
    /// Callers walking a command tree re-scan from `index + 1` with the schema
    /// of the level they descended into.
    pub fn next_positional(argv: &[String], schema: &Schema) -> Option<usize> {
        let mut i = 0;

        while i < argv.len() {
            let arg = &argv[i];
            if arg == "--" {
                return (i + 1 < argv.len()).then_some(i + 1);
            }
            if arg != "-" && arg.starts_with('-') && !is_negative_number(arg) {
                if arg.contains('=') {
                    i += 1;
                    continue;
                }
                if schema.takes_value(arg) {
                    // Skip the flag itself.
                    i += 1;
                    // Skip the value if present. `--` remains a separator.
                    if i < argv.len() && argv[i] != "--" {
                        i += 1;
                    }
                    continue;
                }
                i += 1;
                continue;
            }

            return Some(i);
        }

        None
    }

    fn is_negative_number(arg: &str) -> bool {
        arg.len() > 1 && arg[1..].parse::<f64>().is_ok()
    }
}

pub mod values {
    use clap::builder::{PossibleValue, TypedValueParser};
    use clap::error::{ContextKind, ContextValue, ErrorKind};
    use std::ffi::OsStr;
    use treecli_metadata::{Value, ValueType};

    /// Parse a textual boolean literal, case-insensitively.
    ///
    /// `yes/true/t/y/1` are true, `no/false/f/n/0` are false.
    pub fn parse_bool(raw: &str) -> Option<bool> {
        match raw.to_ascii_lowercase().as_str() {
            "yes" | "true" | "t" | "y" | "1" => Some(true),
            "no" | "false" | "f" | "n" | "0" => Some(false),
            _ => None,
        }
    }

    /// Coerce raw text into a value of type `ty`.
    pub fn coerce(ty: ValueType, raw: &str) -> Result<Value, String> {
        match ty {
            ValueType::Str => Ok(Value::Str(raw.to_string())),
            ValueType::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid int value: '{raw}'")),
            ValueType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid float value: '{raw}'")),
            ValueType::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("boolean value expected, got '{raw}'")),
        }
    }

    /// Coerce an already-typed value (e.g. from a config file) into `ty`.
    ///
    /// Strings go through [`coerce`]; ints widen to floats.
    pub fn conform(ty: ValueType, value: &Value) -> Result<Value, String> {
        match (ty, value) {
            (_, Value::None) => Ok(Value::None),
            (_, Value::Str(s)) => coerce(ty, s),
            (ValueType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            (_, Value::List(items)) => items
                .iter()
                .map(|item| conform(ty, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (ValueType::Str, other) => Ok(Value::Str(other.to_string())),
            (_, other) if other.value_type() == Some(ty) => Ok(other.clone()),
            (_, other) => Err(format!("expected {ty} value, got '{other}'")),
        }
    }

    /// Declared choices converted to `ty`, so `[1, 2]` matches float input.
    ///
    /// A choice that cannot be converted is kept as declared.
    pub fn conform_choices(ty: ValueType, choices: &[Value]) -> Vec<Value> {
        choices
            .iter()
            .map(|choice| conform(ty, choice).unwrap_or_else(|_| choice.clone()))
            .collect()
    }

    /// `clap` value parser producing a typed [`Value`] restricted to `choices`.
    #[derive(Debug, Clone)]
    pub struct TypedParser {
        ty: ValueType,
        choices: Option<Vec<Value>>,
    }

    impl TypedParser {
        pub fn new(ty: ValueType, choices: Option<Vec<Value>>) -> Self {
            let choices = choices.map(|choices| conform_choices(ty, &choices));
            Self { ty, choices }
        }
    }

    impl TypedValueParser for TypedParser {
        type Value = Value;

        fn parse_ref(
            &self,
            cmd: &clap::Command,
            arg: Option<&clap::Arg>,
            value: &OsStr,
        ) -> Result<Self::Value, clap::Error> {
            let arg_name = arg
                .map(|a| a.to_string())
                .unwrap_or_else(|| "...".to_string());
            let Some(raw) = value.to_str() else {
                return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
            };

            let parsed = coerce(self.ty, raw).map_err(|reason| {
                let mut err = clap::Error::new(ErrorKind::ValueValidation).with_cmd(cmd);
                err.insert(ContextKind::InvalidArg, ContextValue::String(arg_name.clone()));
                err.insert(ContextKind::InvalidValue, ContextValue::String(raw.to_string()));
                err.insert(ContextKind::Custom, ContextValue::String(reason));
                err
            })?;

            if let Some(choices) = &self.choices {
                if !choices.contains(&parsed) {
                    let mut err = clap::Error::new(ErrorKind::InvalidValue).with_cmd(cmd);
                    err.insert(ContextKind::InvalidArg, ContextValue::String(arg_name));
                    err.insert(ContextKind::InvalidValue, ContextValue::String(raw.to_string()));
                    err.insert(
                        ContextKind::ValidValue,
                        ContextValue::Strings(choices.iter().map(|c| c.to_string()).collect()),
                    );
                    return Err(err);
                }
            }

            Ok(parsed)
        }

        fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
            let choices = self.choices.as_ref()?;
            Some(Box::new(
                choices.iter().map(|c| PossibleValue::new(c.to_string())),
            ))
        }
    }
}

pub mod report {
    use clap::error::{ContextKind, ContextValue, ErrorKind};
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ParseErrorKind {
        UnknownSubcommand,
        UnknownArgument,
        InvalidChoice,
        InvalidValue,
        MissingRequired,
        MissingValue,
        PathNotFound,
        Other,
    }

    /// A user input error, ready to be shown to the user.
    ///
    /// `invalid` is the offending token, if any, so renderers can highlight it
    /// inside `message`.
    #[derive(Debug, Clone)]
    pub struct ParseError {
        kind: ParseErrorKind,
        message: String,
        invalid: Option<String>,
    }

    impl ParseError {
        pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
            Self {
                kind,
                message: message.into(),
                invalid: None,
            }
        }

        pub fn with_invalid(mut self, token: impl Into<String>) -> Self {
            self.invalid = Some(token.into());
            self
        }

        pub fn kind(&self) -> ParseErrorKind {
            self.kind
        }

        pub fn message(&self) -> &str {
            self.message.as_str()
        }

        pub fn invalid(&self) -> Option<&str> {
            self.invalid.as_deref()
        }

        pub fn missing_required<S: AsRef<str>>(names: &[S]) -> Self {
            let names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
            Self::new(
                ParseErrorKind::MissingRequired,
                format!("the following arguments are required: {}", names.join(", ")),
            )
        }

        pub fn path_not_found<S: AsRef<str>>(segment: &str, path: &[S]) -> Self {
            let path: Vec<&str> = path.iter().map(|p| p.as_ref()).collect();
            Self::new(
                ParseErrorKind::PathNotFound,
                format!("command not found: '{segment}' (path: {})", path.join(" ")),
            )
            .with_invalid(segment)
        }
    }

    impl fmt::Display for ParseError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for ParseError {}

    fn context_string(err: &clap::Error, kind: ContextKind) -> Option<String> {
        match err.get(kind)? {
            ContextValue::String(s) => Some(s.clone()),
            ContextValue::StyledStr(s) => Some(s.to_string()),
            ContextValue::Strings(v) => Some(v.join(", ")),
            _ => None,
        }
    }

    fn context_strings(err: &clap::Error, kind: ContextKind) -> Vec<String> {
        match err.get(kind) {
            Some(ContextValue::Strings(v)) => v.clone(),
            Some(ContextValue::String(s)) => vec![s.clone()],
            Some(ContextValue::StyledStrs(v)) => v.iter().map(|s| s.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// First line of clap's own rendering, without the `error: ` prefix.
    fn rendered_headline(err: &clap::Error) -> String {
        let text = err.render().to_string();
        let line = text.lines().next().unwrap_or_default().trim();
        line.strip_prefix("error: ").unwrap_or(line).to_string()
    }

    impl From<clap::Error> for ParseError {
        fn from(err: clap::Error) -> Self {
            let arg = context_string(&err, ContextKind::InvalidArg);
            let value = context_string(&err, ContextKind::InvalidValue);

            match err.kind() {
                ErrorKind::InvalidSubcommand => {
                    let name = context_string(&err, ContextKind::InvalidSubcommand)
                        .unwrap_or_default();
                    Self::new(
                        ParseErrorKind::UnknownSubcommand,
                        format!("unrecognized command '{name}'"),
                    )
                    .with_invalid(name)
                }
                ErrorKind::UnknownArgument => {
                    let name = arg.unwrap_or_default();
                    Self::new(
                        ParseErrorKind::UnknownArgument,
                        format!("unrecognized argument '{name}'"),
                    )
                    .with_invalid(name)
                }
                ErrorKind::InvalidValue => {
                    let arg = arg.unwrap_or_default();
                    let valid = context_strings(&err, ContextKind::ValidValue);
                    match value {
                        Some(v) if v.is_empty() => Self::new(
                            ParseErrorKind::MissingValue,
                            format!("argument {arg}: expected a value"),
                        ),
                        Some(v) if !valid.is_empty() => Self::new(
                            ParseErrorKind::InvalidChoice,
                            format!(
                                "argument {arg}: invalid choice: '{v}' (choose from {})",
                                valid.join(", ")
                            ),
                        )
                        .with_invalid(format!("'{v}'")),
                        Some(v) => Self::new(
                            ParseErrorKind::InvalidValue,
                            format!("argument {arg}: invalid value: '{v}'"),
                        )
                        .with_invalid(format!("'{v}'")),
                        None => Self::new(ParseErrorKind::InvalidValue, rendered_headline(&err)),
                    }
                }
                ErrorKind::ValueValidation => {
                    let arg = arg.unwrap_or_default();
                    let reason = context_string(&err, ContextKind::Custom)
                        .unwrap_or_else(|| rendered_headline(&err));
                    let err = Self::new(ParseErrorKind::InvalidValue, format!("argument {arg}: {reason}"));
                    match value {
                        Some(v) => err.with_invalid(format!("'{v}'")),
                        None => err,
                    }
                }
                ErrorKind::MissingRequiredArgument => {
                    Self::new(ParseErrorKind::MissingRequired, rendered_headline(&err))
                }
                ErrorKind::TooFewValues | ErrorKind::WrongNumberOfValues => {
                    Self::new(ParseErrorKind::MissingValue, rendered_headline(&err))
                }
                ErrorKind::TooManyValues => {
                    Self::new(ParseErrorKind::InvalidValue, rendered_headline(&err))
                }
                _ => Self::new(ParseErrorKind::Other, rendered_headline(&err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::args::{self, Schema};
    use super::report::{ParseError, ParseErrorKind};
    use super::values::{self, TypedParser};
    use clap::{Arg, Command};
    use treecli_metadata::{Value, ValueType};

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_stops_at_separator() {
        let argv = owned(&["user", "--", "--help"]);
        assert!(!args::flag(&argv, ["--help", "-h"]));
        assert!(args::flag(&argv, "user"));
    }

    #[test]
    fn tokens_before_cuts_at_first_match() {
        let argv = owned(&["user", "manage", "-h", "extra"]);
        assert_eq!(args::tokens_before(&argv, ["--help", "-h"]), &argv[..2]);
        assert_eq!(args::tokens_before(&argv, "--json"), &argv[..]);
    }

    #[test]
    fn next_positional_skips_flag_values() {
        let argv = owned(&["--level", "3", "--verbose", "user", "greet"]);
        let schema = Schema::new().value_flag("--level");
        assert_eq!(args::next_positional(&argv, &schema), Some(3));
        assert_eq!(args::next_positional(&argv[4..], &schema), Some(0));

        let argv = owned(&["--x=1", "-5"]);
        assert_eq!(args::next_positional(&argv, &Schema::new()), Some(1));
    }

    #[test]
    fn next_positional_after_separator() {
        let argv = owned(&["--verbose", "--", "--help"]);
        assert_eq!(args::next_positional(&argv, &Schema::new()), Some(2));
        assert_eq!(args::next_positional(&argv[..2], &Schema::new()), None);
    }

    #[test]
    fn bool_literals_are_case_insensitive() {
        for raw in ["yes", "TRUE", "t", "Y", "1"] {
            assert_eq!(values::parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["no", "False", "f", "N", "0"] {
            assert_eq!(values::parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(values::parse_bool("maybe"), None);
    }

    #[test]
    fn coerce_reports_type() {
        assert_eq!(values::coerce(ValueType::Int, "42").unwrap(), Value::Int(42));
        let err = values::coerce(ValueType::Int, "abc").unwrap_err();
        assert!(err.contains("invalid int value"));
        assert!(values::coerce(ValueType::Bool, "perhaps").is_err());
    }

    #[test]
    fn conform_widens_and_parses() {
        assert_eq!(
            values::conform(ValueType::Float, &Value::Int(2)).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            values::conform(ValueType::Bool, &Value::from("yes")).unwrap(),
            Value::Bool(true)
        );
        assert!(values::conform(ValueType::Int, &Value::Bool(true)).is_err());
    }

    fn level_command() -> Command {
        Command::new("app").no_binary_name(true).arg(
            Arg::new("level")
                .long("level")
                .value_parser(TypedParser::new(
                    ValueType::Int,
                    Some(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
                )),
        )
    }

    #[test]
    fn typed_parser_accepts_choice() {
        let m = level_command()
            .try_get_matches_from(["--level", "3"])
            .unwrap();
        assert_eq!(m.get_one::<Value>("level"), Some(&Value::Int(3)));
    }

    #[test]
    fn typed_parser_rejects_outside_choices() {
        let err = level_command()
            .try_get_matches_from(["--level", "5"])
            .unwrap_err();
        let err = ParseError::from(err);
        assert_eq!(err.kind(), ParseErrorKind::InvalidChoice);
        assert!(err.message().contains("invalid choice: '5'"), "{}", err.message());
        assert!(err.message().contains("2, 3, 4"), "{}", err.message());
        assert_eq!(err.invalid(), Some("'5'"));
    }

    #[test]
    fn typed_parser_rejects_bad_int() {
        let err = level_command()
            .try_get_matches_from(["--level", "high"])
            .unwrap_err();
        let err = ParseError::from(err);
        assert_eq!(err.kind(), ParseErrorKind::InvalidValue);
        assert!(err.message().contains("invalid int value"), "{}", err.message());
    }

    #[test]
    fn unknown_subcommand_is_classified() {
        let cmd = Command::new("app")
            .no_binary_name(true)
            .subcommand(Command::new("hello"));
        let err = ParseError::from(cmd.try_get_matches_from(["helo"]).unwrap_err());
        assert_eq!(err.kind(), ParseErrorKind::UnknownSubcommand);
        assert_eq!(err.invalid(), Some("helo"));
    }

    #[test]
    fn missing_required_lists_names() {
        let err = ParseError::missing_required(&["name", "role"]);
        assert_eq!(err.kind(), ParseErrorKind::MissingRequired);
        assert_eq!(
            err.message(),
            "the following arguments are required: name, role"
        );
    }

    #[test]
    fn choices_are_converted_to_the_value_type() {
        let cmd = Command::new("app").no_binary_name(true).arg(
            Arg::new("ratio")
                .long("ratio")
                .value_parser(TypedParser::new(
                    ValueType::Float,
                    Some(vec![Value::Int(1), Value::Int(2)]),
                )),
        );
        let m = cmd.clone().try_get_matches_from(["--ratio", "2"]).unwrap();
        assert_eq!(m.get_one::<Value>("ratio"), Some(&Value::Float(2.0)));

        let err = ParseError::from(cmd.try_get_matches_from(["--ratio", "3"]).unwrap_err());
        assert_eq!(err.kind(), ParseErrorKind::InvalidChoice);
        assert_eq!(
            values::conform_choices(ValueType::Str, &[Value::Int(1)]),
            vec![Value::from("1")]
        );
    }

    #[test]
    fn malformed_bool_literal_is_rejected() {
        let cmd = Command::new("app").no_binary_name(true).arg(
            Arg::new("verbose")
                .long("verbose")
                .value_parser(TypedParser::new(ValueType::Bool, None)),
        );
        let m = cmd.clone().try_get_matches_from(["--verbose", "Yes"]).unwrap();
        assert_eq!(m.get_one::<Value>("verbose"), Some(&Value::Bool(true)));

        let err = ParseError::from(cmd.try_get_matches_from(["--verbose", "maybe"]).unwrap_err());
        assert_eq!(err.kind(), ParseErrorKind::InvalidValue);
        assert!(
            err.message().contains("boolean value expected, got 'maybe'"),
            "{}",
            err.message()
        );
        assert_eq!(err.invalid(), Some("'maybe'"));
    }
}
