//! Core adapter framework.
//!
//! Defines the trait all language adapters implement, the registry that maps
//! files to adapters, and the shared conversion from tree-sitter output to
//! the generic syntax tree. Adapters differ only in grammar and in a small
//! normalization table; the walk itself is uniform.

use std::path::Path;

use tree_sitter::Node;

use crate::syntax::{Field, FieldValue, ListItem, NodeId, Scalar, SyntaxNode, SyntaxTree};
use crate::{Error, Result};

/// Trait for language adapters
///
/// Each adapter owns a tree-sitter parser for one language and produces the
/// normalized [`SyntaxTree`] the rest of the pipeline consumes.
pub trait LanguageAdapter: Send + Sync {
    /// Get the language name (for display)
    fn language_name(&self) -> &str;

    /// Get file extensions this adapter handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this adapter can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.file_extensions().contains(&ext)
        } else {
            false
        }
    }

    /// Parse source text into a syntax tree.
    ///
    /// Source that does not parse cleanly is reported as
    /// [`Error::Parse`]; callers treat the file as unparseable.
    fn parse(&self, source: &str) -> Result<SyntaxTree>;
}

/// Registry of language adapters
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter
    pub fn register(&mut self, adapter: impl LanguageAdapter + 'static) {
        self.adapters.push(Box::new(adapter));
    }

    /// Find an adapter for a file
    pub fn find_adapter(&self, path: &Path) -> Option<&dyn LanguageAdapter> {
        self.adapters
            .iter()
            .find(|a| a.can_handle(path))
            .map(|a| a.as_ref())
    }

    /// Get all registered adapters
    pub fn adapters(&self) -> &[Box<dyn LanguageAdapter>] {
        &self.adapters
    }

    /// Every file extension any registered adapter handles
    pub fn extensions(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .flat_map(|a| a.file_extensions().iter().copied())
            .collect()
    }
}

/// Create a default registry with all built-in adapters
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(super::python::PythonAdapter::new());
    registry.register(super::javascript::JavaScriptAdapter::new());
    registry
}

/// Create a registry holding only the named language
pub fn registry_for(language: &str) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" => registry.register(super::python::PythonAdapter::new()),
        "javascript" | "js" => registry.register(super::javascript::JavaScriptAdapter::new()),
        other => {
            return Err(Error::Config(format!("unknown language '{}'", other)));
        }
    }
    Ok(registry)
}

/// Per-language shape normalization applied during conversion
pub(crate) struct Normalization {
    /// Kinds acting as pure statement containers; a field holding one is
    /// flattened into a list of the container's named children, so body
    /// slots read like the logical AST
    pub statement_wrappers: &'static [&'static str],
    /// Kinds whose loose children form the `body` list
    pub body_roots: &'static [&'static str],
}

/// Fail on trees the grammar could not parse cleanly
pub(crate) fn check_syntax(root: Node) -> Result<()> {
    if !root.has_error() {
        return Ok(());
    }
    let message = match find_error(root) {
        Some(point) => format!("syntax error at line {}", point.row + 1),
        None => "syntax error".to_string(),
    };
    Err(Error::Parse(message))
}

fn find_error(node: Node) -> Option<tree_sitter::Point> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position());
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(point) = find_error(child) {
            return Some(point);
        }
    }
    None
}

/// Convert a parsed tree-sitter tree into the generic syntax tree.
///
/// Rules, applied uniformly over the grammar's metadata:
/// - named child with a grammar field -> node field (repeats become a list)
/// - anonymous child with a grammar field -> scalar field of its source text
/// - named child without a field -> appended to the catch-all list field
/// - leaf nodes carry their source text as a `text` scalar
/// - statement wrappers are spliced into the field that held them
pub(crate) fn convert_tree(root: Node, source: &str, norm: &Normalization) -> SyntaxTree {
    let mut tree = SyntaxTree::new();
    let root_id = convert_node(root, source, norm, &mut tree);
    tree.set_root(root_id);
    tree
}

fn convert_node(node: Node, source: &str, norm: &Normalization, tree: &mut SyntaxTree) -> NodeId {
    let mut fields: Vec<Field> = Vec::new();

    if node.named_child_count() == 0 {
        if let Ok(text) = node.utf8_text(source.as_bytes()) {
            append_field(
                &mut fields,
                "text",
                ListItem::Literal(Scalar::Str(text.to_string())),
                false,
            );
        }
    } else {
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                let field_name = cursor.field_name();
                if child.is_named() {
                    match field_name {
                        Some(name) if norm.statement_wrappers.contains(&child.kind()) => {
                            let mut items = Vec::with_capacity(child.named_child_count());
                            let mut inner = child.walk();
                            for statement in child.named_children(&mut inner) {
                                items.push(ListItem::Node(convert_node(
                                    statement, source, norm, tree,
                                )));
                            }
                            extend_field(&mut fields, name, items);
                        }
                        Some(name) => {
                            let id = convert_node(child, source, norm, tree);
                            append_field(&mut fields, name, ListItem::Node(id), false);
                        }
                        None => {
                            let id = convert_node(child, source, norm, tree);
                            let name = if norm.body_roots.contains(&node.kind()) {
                                "body"
                            } else {
                                "children"
                            };
                            append_field(&mut fields, name, ListItem::Node(id), true);
                        }
                    }
                } else if let Some(name) = field_name {
                    // anonymous keyword or operator exposed through a field
                    if let Ok(text) = child.utf8_text(source.as_bytes()) {
                        append_field(
                            &mut fields,
                            name,
                            ListItem::Literal(Scalar::Str(text.to_string())),
                            false,
                        );
                    }
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }

    let start = node.start_position();
    let mut out = SyntaxNode::new(node.kind());
    out.line = Some(start.row as u32 + 1);
    out.column = Some(start.column as u32);
    out.fields = fields;
    tree.push(out)
}

fn promote(value: FieldValue) -> Vec<ListItem> {
    match value {
        FieldValue::Node(id) => vec![ListItem::Node(id)],
        FieldValue::Scalar(scalar) => vec![ListItem::Literal(scalar)],
        FieldValue::List(items) => items,
    }
}

/// Add one entry to a field, upgrading to a list on repeats.
///
/// `force_list` keeps catch-all fields list-shaped even with one entry.
fn append_field(fields: &mut Vec<Field>, name: &str, item: ListItem, force_list: bool) {
    if let Some(field) = fields.iter_mut().find(|f| f.name == name) {
        let taken = std::mem::replace(&mut field.value, FieldValue::List(Vec::new()));
        let mut items = promote(taken);
        items.push(item);
        field.value = FieldValue::List(items);
        return;
    }
    let value = if force_list {
        FieldValue::List(vec![item])
    } else {
        match item {
            ListItem::Node(id) => FieldValue::Node(id),
            ListItem::Literal(scalar) => FieldValue::Scalar(scalar),
        }
    };
    fields.push(Field {
        name: name.to_string(),
        value,
    });
}

fn extend_field(fields: &mut Vec<Field>, name: &str, items: Vec<ListItem>) {
    if let Some(field) = fields.iter_mut().find(|f| f.name == name) {
        let taken = std::mem::replace(&mut field.value, FieldValue::List(Vec::new()));
        let mut existing = promote(taken);
        existing.extend(items);
        field.value = FieldValue::List(existing);
        return;
    }
    fields.push(Field {
        name: name.to_string(),
        value: FieldValue::List(items),
    });
}
