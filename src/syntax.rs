//! Generic syntax tree produced by language adapters.
//!
//! Language adapters normalize parser output into this arena: every node
//! carries a kind tag, optional line/column position, and an ordered list of
//! named fields. A field holds a nested node, an ordered list mixing nodes and
//! literal values, or a single scalar. The conversion to a queryable
//! [`crate::document::Document`] walks this structure reflectively, so no
//! per-kind logic exists anywhere downstream of the adapter.

use std::fmt;

/// Identifier of a node within a [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Arena of syntax nodes for a single parsed file.
///
/// Nodes are pushed bottom-up by the adapter; the root is registered last via
/// [`SyntaxTree::set_root`].
#[derive(Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    root: NodeId,
}

impl SyntaxTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id
    pub fn push(&mut self, node: SyntaxNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Register the root node
    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// Id of the root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by id
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0 as usize]
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One node of the adapter-normalized syntax tree
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    /// Kind tag, e.g. `function_definition`
    pub kind: String,
    /// 1-based source line of the node's start, when known
    pub line: Option<u32>,
    /// 0-based source column of the node's start, when known
    pub column: Option<u32>,
    /// Named fields in declaration order
    pub fields: Vec<Field>,
}

impl SyntaxNode {
    /// Create a node with no position and no fields
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            line: None,
            column: None,
            fields: Vec::new(),
        }
    }

    /// Look up a field value by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }
}

/// A named field of a syntax node
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Value held by a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A single nested node
    Node(NodeId),
    /// An ordered list mixing nested nodes and literal values
    List(Vec<ListItem>),
    /// A single literal value
    Scalar(Scalar),
}

/// One entry of a list field
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Node(NodeId),
    Literal(Scalar),
}

/// A literal value carried by a field
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}
