//! Tree-shaped help output.
//!
//! Rendering is two-pass. The first pass walks the visible part of the tree
//! to find the widest label, giving one alignment column for every help
//! text. The second pass draws the tree with guide glyphs and wraps help
//! text to the space right of that column.

use crate::cli::Cli;
use crate::config::DefaultOverlay;
use crate::error::PathError;
use crate::model::{Argument, Opt};
use crate::style::{Painter, StyleTag};
use crate::tree::{self, Node};
use crate::{HELP_FLAGS, JSON_FLAGS};
use treecli_argparse::args::{Schema, next_positional};
use treecli_argparse::report::ParseError;
use treecli_metadata::Nargs;
use unicode_width::UnicodeWidthStr;

const INDENT: usize = 4;
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const GUIDE: &str = "│   ";
const BLANK: &str = "    ";
const FALLBACK_WRAP: usize = 20;

/// The part of the command line help was requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpPath {
    /// Node names below the root, deepest valid prefix.
    pub names: Vec<String>,
    /// Tokens were left over after reaching a leaf.
    pub trailing: bool,
}

impl HelpPath {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            trailing: false,
        }
    }
}

/// Work out which node `tokens` (everything before `--help`) points at.
///
/// Values of value-taking options are skipped and group positionals are
/// consumed by their group. Any positional token left once a leaf is
/// reached marks the path as trailing.
pub fn help_path(cli: &Cli, tokens: &[String]) -> Result<HelpPath, PathError> {
    let mut path = HelpPath::default();
    let mut ancestors = Vec::new();
    let mut node = cli.root();
    let mut capacity = positional_capacity(node.local_arguments().unwrap_or_default());
    let mut rest = tokens;

    while let Some(idx) = next_positional(rest, &level_schema(&ancestors, node)) {
        let token = &rest[idx];
        rest = &rest[idx + 1..];

        if node.is_leaf() {
            path.trailing = true;
            break;
        }
        if let Some(child) = node.child(token) {
            path.names.push(token.clone());
            ancestors.push(node);
            node = child;
            capacity = positional_capacity(node.local_arguments().unwrap_or_default());
            continue;
        }
        match capacity {
            None => continue,
            Some(n) if n > 0 => {
                capacity = Some(n - 1);
                continue;
            }
            Some(_) => {}
        }

        let mut attempted = path.names.clone();
        attempted.push(token.clone());
        return Err(PathError::NotFound {
            segment: token.clone(),
            path: attempted,
        });
    }
    Ok(path)
}

fn level_schema<'a>(ancestors: &[Node<'a>], node: Node<'a>) -> Schema {
    let set = tree::level_set(ancestors, node).unwrap_or_default();
    set.merged_options()
        .into_iter()
        .filter(|resolved| !resolved.opt.is_flag)
        .flat_map(|resolved| resolved.opt.flags.iter())
        .fold(Schema::new(), |schema, flag| schema.value_flag(flag.clone()))
}

/// How many positional tokens a node consumes; `None` is unbounded.
fn positional_capacity(args: &[Argument]) -> Option<usize> {
    let mut total = 0;
    for arg in args {
        total += match arg.nargs {
            None | Some(Nargs::Optional) => 1,
            Some(Nargs::Exactly(n)) => n,
            Some(Nargs::ZeroOrMore | Nargs::OneOrMore) => return None,
        };
    }
    Some(total)
}

/// Greedy word wrap. A non-positive width falls back to a narrow column.
pub fn wrap(text: &str, width: isize) -> Vec<String> {
    let width = usize::try_from(width)
        .ok()
        .filter(|w| *w > 0)
        .unwrap_or(FALLBACK_WRAP);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let word_len = word.width();
        if !current.is_empty() && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Renders help for one path of a tree.
#[derive(Debug, Clone, Copy)]
pub struct HelpRenderer<'a> {
    cli: &'a Cli,
    overlay: &'a DefaultOverlay,
    painter: Painter<'a>,
}

/// Layout state shared by every label of one rendering.
struct Canvas {
    max_start: usize,
    selected_depth: usize,
    lines: Vec<String>,
}

enum Entry<'a> {
    Option(&'a Opt),
    Child { node: Node<'a>, on_path: bool },
}

impl<'a> HelpRenderer<'a> {
    pub fn new(cli: &'a Cli, overlay: &'a DefaultOverlay, painter: Painter<'a>) -> Self {
        Self {
            cli,
            overlay,
            painter,
        }
    }

    pub fn render(&self, path: &HelpPath) -> Result<String, PathError> {
        let root = self.cli.root();
        let nodes = tree::resolve_path(root, &path.names)?;
        let effective = &path.names[..nodes.len() - 1];
        let selected = nodes[nodes.len() - 1];

        let mut max_start = 0;
        self.measure(root, effective, 0, &mut max_start);
        let mut canvas = Canvas {
            max_start,
            selected_depth: effective.len(),
            lines: Vec::new(),
        };

        let trailing = path.trailing || effective.len() < path.names.len();
        canvas.lines.push(self.usage(effective, trailing));
        canvas.lines.push(self.painter.paint(
            &format!("Description: {}", selected.help()),
            StyleTag::RequestedHelp,
        ));
        let root_lines = self.root_label(&canvas);
        canvas.lines.extend(root_lines);
        self.add_children(&mut canvas, root, true, effective, 0, "");

        let mut out = canvas.lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    fn usage(&self, names: &[String], trailing: bool) -> String {
        let mut text = format!("Usage: {} ", self.cli.name());
        for name in names {
            text.push_str(name);
            text.push(' ');
        }
        if trailing {
            text.push_str("[ARGS...] ");
        }
        text.push_str("...");
        let reserved: Vec<&str> = JSON_FLAGS.iter().chain(HELP_FLAGS.iter()).copied().collect();
        let reserved = format!(" ({})", reserved.join(", "));
        format!(
            "{}{}",
            self.painter.paint_spec(&text, "bold", false),
            self.painter.paint(&reserved, StyleTag::Guide)
        )
    }

    fn measure(&self, node: Node<'_>, remaining: &[String], depth: usize, max_start: &mut usize) {
        let name_len = node.name().width() + args_len(&self.args_part(node));
        *max_start = (*max_start).max(depth * INDENT + name_len);
        for opt in tree::option_order(node.local_options().unwrap_or_default()) {
            let opt_len = opt_name(opt).width() + self.opt_suffix(opt).width();
            *max_start = (*max_start).max((depth + 1) * INDENT + opt_len);
        }
        if node.is_leaf() {
            return;
        }
        match remaining.split_first() {
            Some((next, rest)) => {
                if let Some(child) = node.children().into_iter().find(|c| c.name() == next) {
                    self.measure(child, rest, depth + 1, max_start);
                }
            }
            None => {
                for child in node.children() {
                    self.measure(child, &[], depth + 1, max_start);
                }
            }
        }
    }

    /// Argument placeholders such as `[NAME, int (a|b)]`.
    fn args_part(&self, node: Node<'_>) -> String {
        let args: Vec<&Argument> = node.local_arguments().unwrap_or_default().iter().collect();
        tree::display_order(&args)
            .into_iter()
            .map(|arg| {
                let mut extra = Vec::new();
                if self.cli.is_show_types() {
                    extra.push(arg.arg_type.to_string());
                }
                if let Some(choices) = &arg.choices {
                    extra.push(format!("({})", join_choices(choices)));
                }
                if extra.is_empty() {
                    format!("[{}]", arg.name.to_uppercase())
                } else {
                    format!("[{}, {}]", arg.name.to_uppercase(), extra.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn opt_suffix(&self, opt: &Opt) -> String {
        let mut suffix = String::new();
        if self.cli.is_show_types() {
            suffix.push_str(": ");
            suffix.push_str(opt.arg_type.name());
        }
        if let Some(choices) = &opt.choices {
            suffix.push_str(&format!(" ({})", join_choices(choices)));
        }
        suffix
    }

    fn root_label(&self, canvas: &Canvas) -> Vec<String> {
        let dim = canvas.selected_depth > 0;
        let root = self.cli.root();
        let args = self.args_part(root);
        let mut head = self.painter.paint_dim(root.name(), StyleTag::App, dim);
        if !args.is_empty() {
            head.push(' ');
            head.push_str(&self.painter.paint_dim(&args, StyleTag::Argument, dim));
        }
        let name_len = root.name().width() + args_len(&args);
        self.attach_help(canvas, head, name_len, 0, &root.help(), StyleTag::NormalHelp, dim)
    }

    fn node_label(
        &self,
        canvas: &Canvas,
        node: Node<'_>,
        on_path: bool,
        depth: usize,
    ) -> Vec<String> {
        let dim = on_path && depth < canvas.selected_depth;
        let name_tag = match node {
            Node::Root(_) => StyleTag::App,
            Node::Group(_) => StyleTag::Group,
            Node::Command(_) | Node::Chain(_) => StyleTag::Command,
        };
        let help_tag = if on_path {
            StyleTag::RequestedHelp
        } else {
            StyleTag::NormalHelp
        };

        let args = self.args_part(node);
        let mut head = self.painter.paint_dim(node.name(), name_tag, dim);
        if !args.is_empty() {
            head.push(' ');
            head.push_str(&self.painter.paint_dim(&args, StyleTag::Argument, dim));
        }
        let name_len = node.name().width() + args_len(&args);
        self.attach_help(canvas, head, name_len, depth, &node.help(), help_tag, dim)
    }

    fn option_label(&self, canvas: &Canvas, opt: &Opt, depth: usize, dim: bool) -> Vec<String> {
        let flags = opt_name(opt);
        let suffix = self.opt_suffix(opt);
        let mut head = self.painter.paint_dim(&flags, StyleTag::Option, dim);
        head.push_str(&self.painter.paint(&suffix, StyleTag::TypeColor));
        let name_len = flags.width() + suffix.width();
        let mut lines = self.attach_help(
            canvas,
            head,
            name_len,
            depth,
            &opt.help,
            StyleTag::OptionHelp,
            dim,
        );

        let default = opt
            .get_dest()
            .and_then(|dest| self.overlay.get(&dest).cloned())
            .or_else(|| opt.default.clone())
            .filter(|value| !value.is_none());
        let Some(default) = default.filter(|_| self.cli.is_show_defaults()) else {
            return lines;
        };
        let text = self
            .painter
            .paint(&format!(" (default: {default})"), StyleTag::DefaultValue);
        if let Some(last) = lines.last_mut() {
            if opt.help.trim().is_empty() {
                let padding = canvas.max_start.saturating_sub(depth * INDENT + name_len);
                last.push_str(&" ".repeat(padding + 1));
            }
            last.push_str(&text);
        }
        lines
    }

    /// Pad `head` to the alignment column and append wrapped help text.
    #[allow(clippy::too_many_arguments)]
    fn attach_help(
        &self,
        canvas: &Canvas,
        mut head: String,
        name_len: usize,
        depth: usize,
        help: &str,
        tag: StyleTag,
        dim: bool,
    ) -> Vec<String> {
        let padding = canvas.max_start.saturating_sub(depth * INDENT + name_len);
        let width = self.cli.get_max_width() as isize - (canvas.max_start as isize + 1);
        let help_lines = wrap(help, width);
        let Some((first, rest)) = help_lines.split_first() else {
            return vec![head];
        };

        if self.cli.is_line_connect() {
            let rule = "─".repeat(padding + 1);
            head.push_str(&self.painter.paint(&rule, StyleTag::Connector));
        } else {
            head.push_str(&" ".repeat(padding + 1));
        }
        head.push_str(&self.painter.paint_dim(first, tag, dim));

        let indent = " ".repeat(name_len + padding + 1);
        let mut lines = vec![head];
        for line in rest {
            lines.push(format!("{indent}{}", self.painter.paint_dim(line, tag, dim)));
        }
        lines
    }

    fn add_children(
        &self,
        canvas: &mut Canvas,
        node: Node<'_>,
        on_path: bool,
        remaining: &[String],
        depth: usize,
        prefix: &str,
    ) {
        let is_ancestor = depth < canvas.selected_depth;
        let options = node.local_options().unwrap_or_default();
        let mut entries: Vec<Entry<'_>> = tree::option_order(options)
            .into_iter()
            .map(Entry::Option)
            .collect();

        let mut next_remaining: &[String] = &[];
        if !node.is_leaf() {
            match remaining.split_first() {
                Some((next, rest)) if on_path => {
                    if let Some(child) = node.children().into_iter().find(|c| c.name() == next) {
                        entries.push(Entry::Child {
                            node: child,
                            on_path: true,
                        });
                        next_remaining = rest;
                    }
                }
                _ => entries.extend(node.children().into_iter().map(|child| Entry::Child {
                    node: child,
                    on_path: false,
                })),
            }
        }

        let count = entries.len();
        for (idx, entry) in entries.into_iter().enumerate() {
            let last = idx + 1 == count;
            let (branch, guide) = if last {
                (LAST_BRANCH, BLANK)
            } else {
                (BRANCH, GUIDE)
            };
            let branch = self.painter.paint(branch, StyleTag::Guide);
            let guide = format!("{prefix}{}", self.painter.paint(guide, StyleTag::Guide));

            let label = match &entry {
                Entry::Option(opt) => self.option_label(canvas, opt, depth + 1, is_ancestor),
                Entry::Child { node, on_path } => {
                    self.node_label(canvas, *node, *on_path, depth + 1)
                }
            };
            let mut label = label.into_iter();
            if let Some(first) = label.next() {
                canvas.lines.push(format!("{prefix}{branch}{first}"));
            }
            for line in label {
                canvas.lines.push(format!("{guide}{line}"));
            }

            if let Entry::Child { node, on_path } = entry {
                self.add_children(canvas, node, on_path, next_remaining, depth + 1, &guide);
            }
        }
    }
}

fn opt_name(opt: &Opt) -> String {
    opt.display_flags().join(", ")
}

fn join_choices(choices: &[treecli_metadata::Value]) -> String {
    choices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

fn args_len(args: &str) -> usize {
    if args.is_empty() {
        0
    } else {
        1 + args.width()
    }
}

/// Format a user input error with the offending value highlighted.
pub fn render_error(err: &ParseError, painter: Painter<'_>) -> String {
    let mut message = err.message().to_string();
    if let Some(invalid) = err.invalid().filter(|token| !token.is_empty()) {
        if let Some(pos) = message.find(invalid) {
            let painted = painter.paint_spec(invalid, "yellow", false);
            message.replace_range(pos..pos + invalid.len(), &painted);
        }
    }
    format!("{} {message}", painter.paint_spec("Error:", "bold red", false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::Callback;
    use crate::model::{Chain, Command, Group};
    use treecli_metadata::ValueType;

    fn cb(name: &str) -> Callback {
        Callback::new(name, |_| Ok(()))
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Cli {
        Cli::new("app")
            .help("Demo app")
            .option(Opt::new(["-v", "--verbose"]).flag().help("Verbose output"))
            .command(Command::new("hello", cb("hello")).help("Say hello"))
            .group(
                Group::new("user")
                    .help("User ops")
                    .argument(Argument::new("user_id").arg_type(ValueType::Int))
                    .option(Opt::new(["--level"]).arg_type(ValueType::Int))
                    .command(
                        Command::new("add", cb("add"))
                            .help("Add user")
                            .argument(Argument::new("name")),
                    ),
            )
    }

    fn render(cli: &Cli, names: &[&str]) -> String {
        let overlay = DefaultOverlay::empty();
        HelpRenderer::new(cli, &overlay, Painter::plain())
            .render(&HelpPath::new(names.iter().copied()))
            .unwrap()
    }

    #[test]
    fn root_help_aligns_every_label() {
        let cli = Cli::new("app")
            .help("Demo app")
            .option(Opt::new(["-v", "--verbose"]).flag().help("Verbose output"))
            .command(Command::new("hello", cb("hello")).help("Say hello"))
            .group(
                Group::new("user")
                    .help("User ops")
                    .argument(Argument::new("user_id"))
                    .command(
                        Command::new("add", cb("add"))
                            .help("Add user")
                            .argument(Argument::new("name")),
                    ),
            );
        let expected = "\
Usage: app ... (--json, -j, --help, -h)
Description: Demo app
app                Demo app
├── --verbose, -v  Verbose output
├── hello          Say hello
└── user [USER_ID] User ops
    └── add [NAME] Add user
";
        assert_eq!(render(&cli, &[]), expected);
    }

    #[test]
    fn group_help_is_scoped_to_its_subtree() {
        let cli = sample();
        let out = render(&cli, &["user"]);
        assert!(out.starts_with("Usage: app user ... (--json"), "{out}");
        assert!(out.contains("Description: User ops"), "{out}");
        assert!(out.contains("└── user [USER_ID]"), "{out}");
        assert!(out.contains("add [NAME]"), "{out}");
        assert!(out.contains("--level"), "{out}");
        assert!(!out.contains("hello"), "{out}");
        // Root options stay visible on the way down.
        assert!(out.contains("--verbose, -v"), "{out}");
    }

    #[test]
    fn rendering_is_idempotent() {
        let cli = sample().show_types(true).line_connect(true);
        assert_eq!(render(&cli, &["user"]), render(&cli, &["user"]));
        assert_eq!(render(&cli, &[]), render(&cli, &[]));
    }

    #[test]
    fn types_and_choices_in_labels() {
        let cli = Cli::new("app").show_types(true).command(
            Command::new("set-level", cb("set"))
                .argument(Argument::new("mode").choices(["a", "b"]))
                .option(
                    Opt::new(["--level"])
                        .arg_type(ValueType::Int)
                        .choices([2, 3, 4])
                        .help("Level"),
                ),
        );
        let out = render(&cli, &[]);
        assert!(out.contains("set-level [MODE, str (a|b)]"), "{out}");
        assert!(out.contains("--level: int (2|3|4)    Level"), "{out}");
    }

    #[test]
    fn connector_replaces_padding() {
        let cli = Cli::new("app")
            .line_connect(true)
            .command(Command::new("a", cb("a")).help("short"))
            .command(Command::new("longer", cb("b")).help("other"));
        let out = render(&cli, &[]);
        assert!(out.contains("├── a──────short"), "{out}");
        assert!(out.contains("└── longer─other"), "{out}");
    }

    #[test]
    fn wide_characters_align_by_display_width() {
        let cli = Cli::new("app")
            .command(Command::new("abcdef", cb("a")).help("narrow"))
            .command(Command::new("日本語", cb("b")).help("wide"));
        let out = render(&cli, &[]);
        assert!(out.contains("├── abcdef narrow"), "{out}");
        assert!(out.contains("└── 日本語 wide"), "{out}");

        assert_eq!(wrap("ab 日本 cd", 5), vec!["ab", "日本", "cd"]);
    }

    #[test]
    fn defaults_prefer_the_overlay() {
        let cli = Cli::new("app")
            .show_defaults(true)
            .option(Opt::new(["--level"]).arg_type(ValueType::Int).default(2).help("Level"))
            .option(Opt::new(["--name"]).default("bob"));
        let mut raw = std::collections::BTreeMap::new();
        raw.insert("level".to_string(), treecli_metadata::Value::Int(3));
        let overlay = DefaultOverlay::from_mapping(raw, &cli).unwrap();
        let out = HelpRenderer::new(&cli, &overlay, Painter::plain())
            .render(&HelpPath::default())
            .unwrap();
        assert!(out.contains("--level Level (default: 3)"), "{out}");
        assert!(out.contains("└── --name   (default: bob)"), "{out}");
    }

    #[test]
    fn long_help_wraps_under_the_column() {
        let cli = Cli::new("app").max_width(20).command(
            Command::new("run", cb("run")).help("one two three four five six"),
        );
        let out = render(&cli, &[]);
        // Column is 7, leaving 12 characters per line.
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[3], "└── run one two");
        assert_eq!(lines[4], "        three four");
        assert_eq!(lines[5], "        five six");
    }

    #[test]
    fn chain_shows_member_entries() {
        let chain = Chain::new(
            "both",
            vec![
                Command::new("cmd1", cb("a")).argument(Argument::new("a")),
                Command::new("cmd2", cb("b")).option(Opt::new(["--flag"]).flag()),
            ],
        );
        let cli = Cli::new("app").chain(chain);
        let out = render(&cli, &[]);
        assert!(out.contains("both [A]   cmd1 ➜ cmd2"), "{out}");
        assert!(out.contains("    └── --flag"), "{out}");
    }

    #[test]
    fn wrap_is_greedy() {
        assert_eq!(wrap("a bb ccc dddd", 6), vec!["a bb", "ccc", "dddd"]);
        assert_eq!(wrap("", 10), Vec::<String>::new());
        assert_eq!(wrap("x", -3), vec!["x"]);
    }

    #[test]
    fn help_path_walks_groups_and_values() {
        let cli = sample();
        let path = help_path(&cli, &argv(&["-v", "user", "5", "--level", "3", "add"])).unwrap();
        assert_eq!(path, HelpPath::new(["user", "add"]));

        let path = help_path(&cli, &argv(&["user", "5", "add", "bob"])).unwrap();
        assert_eq!(path.names, vec!["user", "add"]);
        assert!(path.trailing);
    }

    #[test]
    fn help_path_rejects_unknown_segments() {
        let cli = sample();
        let Err(PathError::NotFound { segment, path }) = help_path(&cli, &argv(&["nope"])) else {
            panic!("expected NotFound");
        };
        assert_eq!(segment, "nope");
        assert_eq!(path, vec!["nope"]);

        // The group takes a single positional.
        assert!(help_path(&cli, &argv(&["user", "5", "6"])).is_err());
    }

    #[test]
    fn error_highlights_invalid_token() {
        let err = ParseError::new(
            treecli_argparse::report::ParseErrorKind::InvalidChoice,
            "argument --level: invalid choice: '5' (choose from 2, 3, 4)",
        )
        .with_invalid("'5'");
        assert_eq!(
            render_error(&err, Painter::plain()),
            "Error: argument --level: invalid choice: '5' (choose from 2, 3, 4)"
        );
        let colors = crate::style::ColorConfig::default();
        let painted = render_error(&err, Painter::new(&colors, true));
        assert!(painted.contains("\u{1b}["), "{painted}");
        assert!(painted.contains("'5'"), "{painted}");
    }
}
