//! Tree walking: node views, depth, path resolution and inherited
//! argument/option sets.

use crate::callback::ParamType;
use crate::error::{DefinitionError, PathError};
use crate::model::{Argument, Chain, Command, Group, Leaf, Opt};
use indexmap::IndexMap;
use std::borrow::Cow;
use treecli_metadata::NodeKind;

/// A borrowed view of one node of the command tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Root(&'a Group),
    Group(&'a Group),
    Command(&'a Command),
    Chain(&'a Chain),
}

impl<'a> Node<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Node::Root(g) | Node::Group(g) => &g.name,
            Node::Command(c) => &c.name,
            Node::Chain(c) => &c.name,
        }
    }

    pub fn help(&self) -> Cow<'a, str> {
        match self {
            Node::Root(g) | Node::Group(g) => Cow::Borrowed(&g.help),
            Node::Command(c) => Cow::Borrowed(&c.help),
            Node::Chain(c) => Cow::Owned(c.help_text()),
        }
    }

    pub fn sort_key(&self) -> i32 {
        match self {
            Node::Root(_) => 0,
            Node::Group(g) => g.sort_key,
            Node::Command(c) => c.sort_key,
            Node::Chain(c) => c.sort_key,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Root(_) => NodeKind::Cli,
            Node::Group(_) => NodeKind::Group,
            Node::Command(_) => NodeKind::Command,
            Node::Chain(_) => NodeKind::Chain,
        }
    }

    /// Commands and chains are leaves; they have no children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Command(_) | Node::Chain(_))
    }

    fn group(&self) -> Option<&'a Group> {
        match self {
            Node::Root(g) | Node::Group(g) => Some(g),
            Node::Command(_) | Node::Chain(_) => None,
        }
    }

    /// Children in declaration order: subgroups first, then commands.
    pub fn declared_children(&self) -> Vec<Node<'a>> {
        let Some(group) = self.group() else {
            return Vec::new();
        };
        let subgroups = group.subgroups.iter().map(Node::Group);
        let leaves = group.commands.iter().map(|leaf| match leaf {
            Leaf::Command(c) => Node::Command(c),
            Leaf::Chain(c) => Node::Chain(c),
        });
        subgroups.chain(leaves).collect()
    }

    /// Children ordered by `(sort_key, name)`.
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut children = self.declared_children();
        children.sort_by(|a, b| (a.sort_key(), a.name()).cmp(&(b.sort_key(), b.name())));
        children
    }

    /// First child named `name`, in declaration order.
    pub fn child(&self, name: &str) -> Option<Node<'a>> {
        self.declared_children()
            .into_iter()
            .find(|c| c.name() == name)
    }

    /// Arguments this node contributes itself (a chain contributes its members').
    pub fn local_arguments(&self) -> Result<&'a [Argument], DefinitionError> {
        match self {
            Node::Root(g) | Node::Group(g) => Ok(&g.arguments),
            Node::Command(c) => Ok(&c.arguments),
            Node::Chain(c) => c.effective_arguments(),
        }
    }

    /// Options this node contributes itself (a chain contributes its members').
    pub fn local_options(&self) -> Result<&'a [Opt], DefinitionError> {
        match self {
            Node::Root(g) | Node::Group(g) => Ok(&g.options),
            Node::Command(c) => Ok(&c.options),
            Node::Chain(c) => c.effective_options(),
        }
    }
}

/// Number of edges on the longest root-to-leaf path. A lone root is 0.
pub fn max_depth(node: Node<'_>) -> usize {
    node.declared_children()
        .into_iter()
        .map(|child| 1 + max_depth(child))
        .max()
        .unwrap_or(0)
}

/// Walk `names` child by child from `root`.
///
/// Returns the visited nodes, root first. Walking stops early, without an
/// error, when a leaf is reached with names left over; the caller decides
/// what the remainder means. A name with no matching child is a
/// [`PathError`].
pub fn resolve_path<'a, S: AsRef<str>>(
    root: Node<'a>,
    names: &[S],
) -> Result<Vec<Node<'a>>, PathError> {
    let mut nodes = vec![root];
    let mut current = root;
    for name in names {
        if current.is_leaf() {
            break;
        }
        let name = name.as_ref();
        let Some(child) = current.child(name) else {
            return Err(PathError::NotFound {
                segment: name.to_string(),
                path: names.iter().map(|n| n.as_ref().to_string()).collect(),
            });
        };
        nodes.push(child);
        current = child;
    }
    Ok(nodes)
}

/// An option together with its resolved destination.
#[derive(Debug, Clone)]
pub struct ResolvedOpt<'a> {
    pub opt: &'a Opt,
    pub dest: String,
}

/// Arguments and options a node sees, in root-to-node order.
#[derive(Debug, Clone, Default)]
pub struct EffectiveSet<'a> {
    pub arguments: Vec<&'a Argument>,
    pub options: Vec<ResolvedOpt<'a>>,
}

impl<'a> EffectiveSet<'a> {
    /// Destination name to the type the CLI delivers for it.
    ///
    /// A later entry with the same destination replaces the earlier one.
    pub fn destinations(&self) -> IndexMap<String, ParamType> {
        let mut provided = IndexMap::new();
        for arg in &self.arguments {
            provided.insert(arg.get_dest().to_string(), arg.derived_type());
        }
        for opt in &self.options {
            provided.insert(opt.dest.clone(), opt.opt.derived_type());
        }
        provided
    }

    /// Options deduplicated by destination; the most local declaration wins.
    pub fn merged_options(&self) -> Vec<&ResolvedOpt<'a>> {
        let mut merged: IndexMap<&str, &ResolvedOpt<'a>> = IndexMap::new();
        for opt in &self.options {
            merged.insert(opt.dest.as_str(), opt);
        }
        merged.into_values().collect()
    }
}

fn resolve_options<'a>(
    owner: &str,
    opts: impl IntoIterator<Item = &'a Opt>,
    into: &mut Vec<ResolvedOpt<'a>>,
) -> Result<(), DefinitionError> {
    for opt in opts {
        let dest = opt.get_dest().ok_or_else(|| DefinitionError::NoFlags {
            node: owner.to_string(),
        })?;
        into.push(ResolvedOpt { opt, dest });
    }
    Ok(())
}

fn inherited_options<'a>(
    ancestors: &[Node<'a>],
    into: &mut Vec<ResolvedOpt<'a>>,
) -> Result<(), DefinitionError> {
    for ancestor in ancestors {
        let opts = ancestor.local_options()?;
        resolve_options(ancestor.name(), opts.iter().filter(|o| o.inherit), into)?;
    }
    Ok(())
}

/// Compose an effective set from ancestors plus explicit own entries.
pub(crate) fn compose<'a>(
    ancestors: &[Node<'a>],
    owner: &str,
    arguments: &'a [Argument],
    options: &'a [Opt],
) -> Result<EffectiveSet<'a>, DefinitionError> {
    let mut set = EffectiveSet::default();
    for ancestor in ancestors {
        set.arguments.extend(ancestor.local_arguments()?.iter());
    }
    set.arguments.extend(arguments.iter());
    inherited_options(ancestors, &mut set.options)?;
    resolve_options(owner, options, &mut set.options)?;
    Ok(set)
}

/// Effective arguments and options of `node` below `ancestors` (root first).
///
/// Arguments: every ancestor's local arguments, then the node's own.
/// Options: every ancestor's inheritable options, then the node's own.
pub fn effective_set<'a>(
    ancestors: &[Node<'a>],
    node: Node<'a>,
) -> Result<EffectiveSet<'a>, DefinitionError> {
    compose(
        ancestors,
        node.name(),
        node.local_arguments()?,
        node.local_options()?,
    )
}

/// What one parser level registers for `node`: its own positionals, and
/// the inheritable ancestor options plus its own options.
pub fn level_set<'a>(
    ancestors: &[Node<'a>],
    node: Node<'a>,
) -> Result<EffectiveSet<'a>, DefinitionError> {
    let mut set = EffectiveSet {
        arguments: node.local_arguments()?.iter().collect(),
        options: Vec::new(),
    };
    inherited_options(ancestors, &mut set.options)?;
    resolve_options(node.name(), node.local_options()?, &mut set.options)?;
    Ok(set)
}

/// Sort key for parse order: `sort_key`, ties kept in declaration order.
pub(crate) fn parse_order<'a>(args: &[&'a Argument]) -> Vec<&'a Argument> {
    let mut ordered = args.to_vec();
    ordered.sort_by_key(|a| a.sort_key);
    ordered
}

/// Sort for display: `(sort_key, name)`.
pub(crate) fn display_order<'a>(args: &[&'a Argument]) -> Vec<&'a Argument> {
    let mut ordered = args.to_vec();
    ordered.sort_by(|a, b| (a.sort_key, &a.name).cmp(&(b.sort_key, &b.name)));
    ordered
}

/// Options sorted by `(sort_key, first flag)`.
pub(crate) fn option_order<'a>(opts: &'a [Opt]) -> Vec<&'a Opt> {
    let mut ordered: Vec<&Opt> = opts.iter().collect();
    ordered.sort_by(|a, b| (a.sort_key, a.first_flag()).cmp(&(b.sort_key, b.first_flag())));
    ordered
}
