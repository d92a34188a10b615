use crate::model::{Argument, Chain, Command, Group, Opt};
use crate::style::{ColorChoice, ColorConfig, ColorTheme};
use crate::tree::Node;
use std::path::{Path, PathBuf};

/// The root of a command tree plus presentation settings.
#[derive(Debug, Clone)]
pub struct Cli {
    root: Group,
    max_width: usize,
    colors: ColorConfig,
    show_types: bool,
    show_defaults: bool,
    line_connect: bool,
    color: ColorChoice,
    config_file: Option<PathBuf>,
}

impl Cli {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: Group::new(name),
            max_width: 120,
            colors: ColorConfig::default(),
            show_types: false,
            show_defaults: false,
            line_connect: false,
            color: ColorChoice::Auto,
            config_file: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.root.help = help.into();
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.root.subgroups.push(group);
        self
    }

    pub fn command(mut self, cmd: Command) -> Self {
        self.root = self.root.command(cmd);
        self
    }

    pub fn chain(mut self, chain: Chain) -> Self {
        self.root = self.root.chain(chain);
        self
    }

    pub fn argument(mut self, arg: Argument) -> Self {
        self.root.arguments.push(arg);
        self
    }

    pub fn option(mut self, opt: Opt) -> Self {
        self.root.options.push(opt);
        self
    }

    /// Column at which help text wraps.
    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    pub fn theme(mut self, theme: ColorTheme) -> Self {
        self.colors = ColorConfig::from_theme(theme);
        self
    }

    pub fn colors(mut self, colors: ColorConfig) -> Self {
        self.colors = colors;
        self
    }

    pub fn show_types(mut self, show: bool) -> Self {
        self.show_types = show;
        self
    }

    pub fn show_defaults(mut self, show: bool) -> Self {
        self.show_defaults = show;
        self
    }

    /// Draw a horizontal rule between labels and their help text.
    pub fn line_connect(mut self, connect: bool) -> Self {
        self.line_connect = connect;
        self
    }

    pub fn color(mut self, choice: ColorChoice) -> Self {
        self.color = choice;
        self
    }

    /// Key-value file overriding option defaults, loaded once per run.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    pub fn root(&self) -> Node<'_> {
        Node::Root(&self.root)
    }

    pub fn get_max_width(&self) -> usize {
        self.max_width
    }

    pub fn get_colors(&self) -> &ColorConfig {
        &self.colors
    }

    pub fn is_show_types(&self) -> bool {
        self.show_types
    }

    pub fn is_show_defaults(&self) -> bool {
        self.show_defaults
    }

    pub fn is_line_connect(&self) -> bool {
        self.line_connect
    }

    pub fn get_color(&self) -> ColorChoice {
        self.color
    }

    pub fn get_config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}
