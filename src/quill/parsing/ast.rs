//! Template AST
//!
//! The tree is an arena: nodes live in one `Vec` and refer to each other by [`NodeId`]. The
//! root is always node 0.

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Literal text at the root, or the expression inside a construct.
    Expression(String),
    /// Children: a `DirectiveName` and an optional `Expression`.
    Directive,
    DirectiveName(String),
    /// Children: one `Expression`.
    SanitizedTag,
    /// Children: one `Expression`.
    UnsanitizedTag,
    /// Children: one `Expression`.
    Comment,
    /// Children: one `Expression`.
    HostCode,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Expression(_) => "Expression",
            NodeKind::Directive => "Directive",
            NodeKind::DirectiveName(_) => "DirectiveName",
            NodeKind::SanitizedTag => "SanitizedTag",
            NodeKind::UnsanitizedTag => "UnsanitizedTag",
            NodeKind::Comment => "Comment",
            NodeKind::HostCode => "HostCode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Line the node starts on.
    pub line: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Ast {
            nodes: vec![Node {
                kind: NodeKind::Root,
                line: 1,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::ROOT]
    }

    /// The node with `id`. Ids handed out by [`Ast::append`] are always valid.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Append a new node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, line: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            line,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Text of the first `Expression` child of `id`.
    pub fn expression_of(&self, id: NodeId) -> Option<&str> {
        self.node(id)
            .children
            .iter()
            .find_map(|child| match &self.node(*child).kind {
                NodeKind::Expression(text) => Some(text.as_str()),
                _ => None,
            })
    }

    /// Name and optional expression of a directive node.
    pub fn directive_parts(&self, id: NodeId) -> Option<(&str, Option<&str>)> {
        let node = self.node(id);
        if node.kind != NodeKind::Directive {
            return None;
        }
        let name = node
            .children
            .iter()
            .find_map(|child| match &self.node(*child).kind {
                NodeKind::DirectiveName(name) => Some(name.as_str()),
                _ => None,
            })?;
        Some((name, self.expression_of(id)))
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
