/// Stable index of a node in a [`Tree`] arena.
///
/// Parent/child edges are index pairs rather than owned references, which
/// keeps upward traversal (scope resolution, hoisting) cheap and the tree
/// free of ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// One element of the syntax tree.
///
/// Terminal kinds keep an empty `children` list for the whole of their life;
/// the parser's bracket rule refuses to descend into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// The closed set of node variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Document root. Holds parse-time metadata: the story title (last
    /// `\title` wins), root-scope variable statements, and raw script/style
    /// bodies hoisted out of the markup.
    Root {
        title: Option<String>,
        variables: Vec<String>,
        scripts: Vec<String>,
        styles: Vec<String>,
    },
    /// A `\section(name, params...)` block, compiled to one function
    /// declaration. Variable statements and raw script/style bodies from
    /// anywhere inside the section are hoisted into these lists.
    Section {
        name: String,
        params: Vec<String>,
        variables: Vec<String>,
        scripts: Vec<String>,
        styles: Vec<String>,
    },
    /// A verbatim run of story text.
    Text { text: String },
    /// A paragraph break (double newline in the source).
    LineBreak,
    Heading1,
    Heading2,
    Bold,
    Emphasis,
    /// `\if(condition)`. The condition is passed through verbatim; it is
    /// evaluated by the host at display time, never by the compiler.
    If {
        condition: String,
        else_branch: Option<NodeId>,
    },
    /// `\else`, linked to its matched If when constructed.
    Else { matched_if: NodeId },
    /// `\nav(target, args...)` — a navigation link.
    Navigate { target: String, args: Vec<String> },
    /// `\show(target, preserve, args...)` — an in-place reveal link.
    Show {
        target: String,
        args: Vec<String>,
        preserve: bool,
    },
    /// `\choices { ... }` — container of Choice links.
    Choices,
    /// `\choice(target, preserve, args...)` — one option inside Choices.
    Choice {
        target: String,
        args: Vec<String>,
        preserve: bool,
    },
    /// `\include(target, args...)` — lazy inline expansion of a section.
    Include { target: String, args: Vec<String> },
    /// `\print(expr)` — an interpolation slot.
    Print { expr: String },
    /// `\image(url, height, width, alt)`.
    Image {
        url: String,
        height: String,
        width: String,
        alt: String,
    },
    /// `\input(type, var[, placeholder])` — an input bound to a variable.
    Input {
        kind: String,
        binding: String,
        placeholder: Option<String>,
    },
}

impl NodeKind {
    /// Whether this variant may own child nodes.
    pub(crate) const fn is_container(&self) -> bool {
        match self {
            Self::Root { .. }
            | Self::Section { .. }
            | Self::Heading1
            | Self::Heading2
            | Self::Bold
            | Self::Emphasis
            | Self::If { .. }
            | Self::Else { .. }
            | Self::Navigate { .. }
            | Self::Show { .. }
            | Self::Choices
            | Self::Choice { .. } => true,
            Self::Text { .. }
            | Self::LineBreak
            | Self::Include { .. }
            | Self::Print { .. }
            | Self::Image { .. }
            | Self::Input { .. } => false,
        }
    }
}

/// The syntax tree for one compilation.
///
/// A fresh `Tree` is created per `compile` call and discarded once the code
/// generator has produced output; no tree state survives across compilations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Index of the Root node. The arena is never empty.
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root {
                    title: None,
                    variables: Vec::new(),
                    scripts: Vec::new(),
                    styles: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Appends a new node under `parent`. The parent edge is fixed here and
    /// never changes afterwards.
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn title(&self) -> Option<&str> {
        match &self.node(Self::ROOT).kind {
            NodeKind::Root { title, .. } => title.as_deref(),
            _ => None,
        }
    }

    /// Walks parent edges from `from` to the nearest enclosing Section, or
    /// Root when the walk never crosses a section boundary. Used to decide
    /// where `\set` statements and raw script/style bodies are hoisted.
    pub(crate) fn hoist_target(&self, from: NodeId) -> NodeId {
        let mut current = from;
        loop {
            match &self.node(current).kind {
                NodeKind::Root { .. } | NodeKind::Section { .. } => return current,
                _ => {
                    // Every non-root node has a parent fixed at construction.
                    current = self.node(current).parent.unwrap_or(Self::ROOT);
                }
            }
        }
    }
}
