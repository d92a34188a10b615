//! Named style tags, built-in palettes and ANSI painting.

use owo_colors::{AnsiColors, DynColors, OwoColorize, Style};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Default,
    Monochrome,
    /// Shades of neon green.
    Mononeon,
}

/// When to emit ANSI styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Style only when writing to a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn stdout_enabled(self) -> bool {
        self.enabled(std::io::stdout().is_terminal())
    }

    pub fn stderr_enabled(self) -> bool {
        self.enabled(std::io::stderr().is_terminal())
    }

    fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => is_terminal && std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTag {
    App,
    Group,
    Command,
    Argument,
    Option,
    OptionHelp,
    RequestedHelp,
    NormalHelp,
    TypeColor,
    Connector,
    Guide,
    DefaultValue,
}

/// Style strings per tag, e.g. `"bold green"` or `"italic rgb(100,100,100)"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorConfig {
    pub app: String,
    pub group: String,
    pub command: String,
    pub argument: String,
    pub option: String,
    pub option_help: String,
    pub requested_help: String,
    pub normal_help: String,
    pub type_color: String,
    pub connector: String,
    pub guide: String,
    pub default_value: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self::from_theme(ColorTheme::Default)
    }
}

impl ColorConfig {
    pub fn from_theme(theme: ColorTheme) -> Self {
        let palette: [&str; 12] = match theme {
            ColorTheme::Default => [
                "bold bright_cyan",
                "bold green",
                "cyan",
                "orange1",
                "yellow",
                "italic yellow",
                "bold white",
                "bold rgb(180,180,180)",
                "dim white",
                "rgb(45,45,45)",
                "rgb(45,45,45)",
                "bold dim white",
            ],
            ColorTheme::Monochrome => [
                "bold italic rgb(200,200,200)",
                "bold rgb(180,180,180)",
                "rgb(160,160,160)",
                "rgb(140,140,140)",
                "rgb(120,120,120)",
                "italic rgb(100,100,100)",
                "rgb(255,255,255)",
                "bold rgb(200,200,200)",
                "rgb(160,160,160)",
                "rgb(80,80,80)",
                "rgb(80,80,80)",
                "bold dim white",
            ],
            ColorTheme::Mononeon => [
                "bold italic rgb(57,255,20)",
                "bold rgb(51,229,18)",
                "rgb(46,204,16)",
                "rgb(40,179,14)",
                "rgb(34,153,12)",
                "italic rgb(29,128,10)",
                "rgb(57,255,20)",
                "rgb(46,204,16)",
                "rgb(40,179,14)",
                "rgb(29,128,10)",
                "rgb(29,128,10)",
                "bold dim white",
            ],
        };
        let [
            app,
            group,
            command,
            argument,
            option,
            option_help,
            requested_help,
            normal_help,
            type_color,
            connector,
            guide,
            default_value,
        ] = palette.map(String::from);
        Self {
            app,
            group,
            command,
            argument,
            option,
            option_help,
            requested_help,
            normal_help,
            type_color,
            connector,
            guide,
            default_value,
        }
    }

    pub fn get(&self, tag: StyleTag) -> &str {
        match tag {
            StyleTag::App => &self.app,
            StyleTag::Group => &self.group,
            StyleTag::Command => &self.command,
            StyleTag::Argument => &self.argument,
            StyleTag::Option => &self.option,
            StyleTag::OptionHelp => &self.option_help,
            StyleTag::RequestedHelp => &self.requested_help,
            StyleTag::NormalHelp => &self.normal_help,
            StyleTag::TypeColor => &self.type_color,
            StyleTag::Connector => &self.connector,
            StyleTag::Guide => &self.guide,
            StyleTag::DefaultValue => &self.default_value,
        }
    }
}

/// Parse a space separated style string.
///
/// Unknown words are ignored so a typo degrades to plain text.
pub fn parse_style(spec: &str) -> Style {
    let mut style = Style::new();
    for word in spec.split_whitespace() {
        style = match word {
            "bold" => style.bold(),
            "dim" => style.dimmed(),
            "italic" => style.italic(),
            "underline" => style.underline(),
            other => match parse_color(other) {
                Some(color) => style.color(color),
                None => style,
            },
        };
    }
    style
}

fn parse_color(word: &str) -> Option<DynColors> {
    if let Some(rgb) = word.strip_prefix("rgb(").and_then(|w| w.strip_suffix(')')) {
        let parts: Vec<u8> = rgb
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .ok()?;
        let [r, g, b] = parts.as_slice() else {
            return None;
        };
        return Some(DynColors::Rgb(*r, *g, *b));
    }
    let ansi = match word {
        "black" => AnsiColors::Black,
        "red" => AnsiColors::Red,
        "green" => AnsiColors::Green,
        "yellow" => AnsiColors::Yellow,
        "blue" => AnsiColors::Blue,
        "magenta" => AnsiColors::Magenta,
        "cyan" => AnsiColors::Cyan,
        "white" => AnsiColors::White,
        "bright_black" => AnsiColors::BrightBlack,
        "bright_red" => AnsiColors::BrightRed,
        "bright_green" => AnsiColors::BrightGreen,
        "bright_yellow" => AnsiColors::BrightYellow,
        "bright_blue" => AnsiColors::BrightBlue,
        "bright_magenta" => AnsiColors::BrightMagenta,
        "bright_cyan" => AnsiColors::BrightCyan,
        "bright_white" => AnsiColors::BrightWhite,
        "orange1" => return Some(DynColors::Rgb(255, 175, 0)),
        _ => return None,
    };
    Some(DynColors::Ansi(ansi))
}

/// Applies tag styles to text, or passes it through when colors are off.
#[derive(Debug, Clone, Copy)]
pub struct Painter<'a> {
    colors: &'a ColorConfig,
    enabled: bool,
}

impl<'a> Painter<'a> {
    pub fn new(colors: &'a ColorConfig, enabled: bool) -> Self {
        Self { colors, enabled }
    }

    pub fn plain() -> Painter<'static> {
        static PLAIN: std::sync::OnceLock<ColorConfig> = std::sync::OnceLock::new();
        Painter {
            colors: PLAIN.get_or_init(ColorConfig::default),
            enabled: false,
        }
    }

    pub fn paint(&self, text: &str, tag: StyleTag) -> String {
        self.paint_spec(text, self.colors.get(tag), false)
    }

    /// Like [`Painter::paint`], additionally dimmed when `dim` is set.
    pub fn paint_dim(&self, text: &str, tag: StyleTag, dim: bool) -> String {
        self.paint_spec(text, self.colors.get(tag), dim)
    }

    pub fn paint_spec(&self, text: &str, spec: &str, dim: bool) -> String {
        if !self.enabled || text.is_empty() {
            return text.to_string();
        }
        let mut style = parse_style(spec);
        if dim {
            style = style.dimmed();
        }
        text.style(style).to_string()
    }
}
