//! Queryable document tree and the conversion from syntax trees.
//!
//! [`TreeBuilder`] lowers one [`SyntaxTree`] into a [`Document`]: a strict
//! tree of tagged elements where scalar fields become string attributes,
//! node and list fields become named slots, and literal list entries become
//! `item` leaves. The document is built per file, queried, and discarded.

use std::collections::HashMap;

use crate::syntax::{FieldValue, ListItem, NodeId, Scalar, SyntaxTree};

/// Attribute holding the 1-based source line of an element.
pub const LINE_ATTR: &str = "line";
/// Attribute holding the 0-based source column of an element.
pub const COLUMN_ATTR: &str = "column";
/// Tag under which literal list entries appear.
pub const ITEM_TAG: &str = "item";

/// Identifier of an element within a [`Document`] arena.
///
/// Ids are assigned in depth-first order, so comparing ids compares document
/// positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

/// A generic labeled tree for one source file.
#[derive(Debug)]
pub struct Document {
    elements: Vec<ElementData>,
    root: ElementId,
}

#[derive(Debug)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    slots: Vec<Slot>,
    /// Owning element and index of the slot holding this element
    parent: Option<(ElementId, u32)>,
}

/// A named child container of an element
#[derive(Debug)]
pub struct Slot {
    pub name: String,
    pub children: Vec<SlotEntry>,
}

/// One child within a slot
#[derive(Debug)]
pub enum SlotEntry {
    /// A nested element
    Element(ElementId),
    /// A literal value, stored as encoded text
    Leaf(String),
}

impl Document {
    /// Id of the root element
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Number of elements in the document
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the document holds no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Tag of an element
    pub fn tag(&self, id: ElementId) -> &str {
        &self.data(id).tag
    }

    /// All attributes of an element, in declaration order
    pub fn attrs(&self, id: ElementId) -> &[(String, String)] {
        &self.data(id).attrs
    }

    /// Look up one attribute value
    pub fn attr(&self, id: ElementId, name: &str) -> Option<&str> {
        self.data(id)
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Ordered slots of an element
    pub fn slots(&self, id: ElementId) -> &[Slot] {
        &self.data(id).slots
    }

    /// Enclosing element, if any
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.data(id).parent.map(|(p, _)| p)
    }

    /// Enclosing element together with the slot index holding `id`
    pub fn parent_slot(&self, id: ElementId) -> Option<(ElementId, usize)> {
        self.data(id).parent.map(|(p, s)| (p, s as usize))
    }

    /// Walk from an element to the root, nearest first including self
    pub fn self_and_ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        std::iter::successors(Some(id), move |&e| self.parent(e))
    }

    /// Render one element (and its subtree) as indented XML-style text
    pub fn xml_string(&self, id: ElementId) -> String {
        let mut out = String::new();
        self.write_element(id, 0, &mut out);
        out
    }

    fn write_element(&self, id: ElementId, depth: usize, out: &mut String) {
        let data = self.data(id);
        let pad = "  ".repeat(depth);
        out.push_str(&pad);
        out.push('<');
        out.push_str(&data.tag);
        for (name, value) in &data.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if data.slots.is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for slot in &data.slots {
            let slot_pad = "  ".repeat(depth + 1);
            if slot.children.is_empty() {
                out.push_str(&format!("{}<{}/>\n", slot_pad, slot.name));
                continue;
            }
            out.push_str(&format!("{}<{}>\n", slot_pad, slot.name));
            for child in &slot.children {
                match child {
                    SlotEntry::Element(e) => self.write_element(*e, depth + 2, out),
                    SlotEntry::Leaf(text) => {
                        out.push_str(&format!(
                            "{}<{}>{}</{}>\n",
                            "  ".repeat(depth + 2),
                            ITEM_TAG,
                            escape_text(text),
                            ITEM_TAG
                        ));
                    }
                }
            }
            out.push_str(&format!("{}</{}>\n", slot_pad, slot.name));
        }
        out.push_str(&format!("{}</{}>\n", pad, data.tag));
    }

    fn data(&self, id: ElementId) -> &ElementData {
        &self.elements[id.0 as usize]
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;")
}

/// One-to-one association from element identity back to the originating
/// syntax node, recorded during conversion on request.
///
/// The restricted query backend cannot answer ancestor lookups at query time;
/// line resolution then reads the original node's position through this table.
#[derive(Debug, Default)]
pub struct NodeMapping {
    entries: HashMap<ElementId, NodeId>,
}

impl NodeMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element/node pair
    pub fn insert(&mut self, element: ElementId, node: NodeId) {
        self.entries.insert(element, node);
    }

    /// Originating syntax node of an element
    pub fn get(&self, element: ElementId) -> Option<NodeId> {
        self.entries.get(&element).copied()
    }

    /// Native line number of the syntax node behind `element`
    pub fn source_line(&self, element: ElementId, tree: &SyntaxTree) -> Option<u32> {
        self.get(element).and_then(|id| tree.node(id).line)
    }

    /// Number of recorded pairs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Node kinds whose leading body docstring may be elided.
const DOCSTRING_KINDS: &[&str] = &["module", "function_definition", "class_definition"];

/// Converts one syntax tree into a [`Document`].
pub struct TreeBuilder<'a> {
    tree: &'a SyntaxTree,
    omit_docstrings: bool,
    elements: Vec<ElementData>,
    mapping: Option<NodeMapping>,
}

impl<'a> TreeBuilder<'a> {
    /// Create a builder for one conversion.
    ///
    /// `record_mapping` must be set when the query backend in use cannot
    /// report ancestor relationships; see [`NodeMapping`].
    pub fn new(tree: &'a SyntaxTree, omit_docstrings: bool, record_mapping: bool) -> Self {
        Self {
            tree,
            omit_docstrings,
            elements: Vec::with_capacity(tree.len()),
            mapping: record_mapping.then(NodeMapping::new),
        }
    }

    /// Run the conversion.
    ///
    /// Conversion trusts the adapter's structural contract and cannot fail;
    /// unencodable literals degrade to empty attribute values.
    pub fn build(mut self) -> (Document, Option<NodeMapping>) {
        let root = self.convert(self.tree.root(), None);
        (
            Document {
                elements: self.elements,
                root,
            },
            self.mapping,
        )
    }

    fn convert(&mut self, node_id: NodeId, parent: Option<(ElementId, u32)>) -> ElementId {
        let tree = self.tree;
        let node = tree.node(node_id);

        let elem_id = ElementId(self.elements.len() as u32);
        self.elements.push(ElementData {
            tag: node.kind.clone(),
            attrs: Vec::new(),
            slots: Vec::new(),
            parent,
        });
        if let Some(mapping) = &mut self.mapping {
            mapping.insert(elem_id, node_id);
        }

        let mut attrs = Vec::new();
        if let Some(line) = node.line {
            attrs.push((LINE_ATTR.to_string(), encode_literal(&Scalar::Int(line as i64))));
        }
        if let Some(column) = node.column {
            attrs.push((
                COLUMN_ATTR.to_string(),
                encode_literal(&Scalar::Int(column as i64)),
            ));
        }

        let eligible = DOCSTRING_KINDS.contains(&node.kind.as_str());
        let mut slots = Vec::new();

        for field in &node.fields {
            match &field.value {
                FieldValue::Node(child) => {
                    let slot_index = slots.len() as u32;
                    let child_elem = self.convert(*child, Some((elem_id, slot_index)));
                    slots.push(Slot {
                        name: field.name.clone(),
                        children: vec![SlotEntry::Element(child_elem)],
                    });
                }
                FieldValue::List(items) => {
                    let slot_index = slots.len() as u32;
                    let mut entries = Vec::with_capacity(items.len());
                    let mut items = items.as_slice();
                    if eligible && self.omit_docstrings && field.name == "body" {
                        if let Some(first) = items.first() {
                            if is_docstring_statement(tree, first) {
                                items = &items[1..];
                            }
                        }
                    }
                    for item in items {
                        match item {
                            ListItem::Node(child) => {
                                let child_elem = self.convert(*child, Some((elem_id, slot_index)));
                                entries.push(SlotEntry::Element(child_elem));
                            }
                            ListItem::Literal(value) => {
                                entries.push(SlotEntry::Leaf(encode_literal(value)));
                            }
                        }
                    }
                    slots.push(Slot {
                        name: field.name.clone(),
                        children: entries,
                    });
                }
                FieldValue::Scalar(value) => {
                    attrs.push((field.name.clone(), encode_literal(value)));
                }
            }
        }

        let data = &mut self.elements[elem_id.0 as usize];
        data.attrs = attrs;
        data.slots = slots;
        elem_id
    }
}

/// True for a bare expression statement whose sole value is a string literal.
///
/// The check is purely positional and structural; callers apply it to the
/// first entry of a body slot only.
fn is_docstring_statement(tree: &SyntaxTree, item: &ListItem) -> bool {
    let ListItem::Node(id) = item else {
        return false;
    };
    let node = tree.node(*id);
    if node.kind != "expression_statement" || node.fields.len() != 1 {
        return false;
    }
    match &node.fields[0].value {
        FieldValue::List(items) => match items.as_slice() {
            [ListItem::Node(inner)] => tree.node(*inner).kind == "string",
            _ => false,
        },
        FieldValue::Node(inner) => tree.node(*inner).kind == "string",
        _ => false,
    }
}

/// Encode a literal for storage as attribute or leaf text.
///
/// The target representation is ASCII: characters outside it are replaced
/// with numeric character references. A value that still cannot be encoded
/// (embedded control bytes) collapses to the empty string rather than
/// failing the conversion.
pub fn encode_literal(value: &Scalar) -> String {
    let text = value.to_string();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            if c.is_ascii_control() && c != '\t' && c != '\n' && c != '\r' {
                return String::new();
            }
            out.push(c);
        } else {
            out.push_str(&format!("&#{};", c as u32));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Field, FieldValue, ListItem, Scalar, SyntaxNode, SyntaxTree};

    fn node(kind: &str, line: Option<u32>, fields: Vec<Field>) -> SyntaxNode {
        let mut n = SyntaxNode::new(kind);
        n.line = line;
        n.column = line.map(|_| 0);
        n.fields = fields;
        n
    }

    fn field(name: &str, value: FieldValue) -> Field {
        Field {
            name: name.to_string(),
            value,
        }
    }

    fn docstring_statement(tree: &mut SyntaxTree, line: u32) -> NodeId {
        let string = tree.push(node(
            "string",
            Some(line),
            vec![field("text", FieldValue::Scalar(Scalar::Str("\"doc\"".into())))],
        ));
        tree.push(node(
            "expression_statement",
            Some(line),
            vec![field("children", FieldValue::List(vec![ListItem::Node(string)]))],
        ))
    }

    /// module with a docstring statement followed by a function definition
    fn sample_tree() -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        let doc = docstring_statement(&mut tree, 1);

        let name = tree.push(node(
            "identifier",
            Some(3),
            vec![field("text", FieldValue::Scalar(Scalar::Str("foo".into())))],
        ));
        let pass = tree.push(node("pass_statement", Some(4), vec![]));
        let func = tree.push(node(
            "function_definition",
            Some(3),
            vec![
                field("name", FieldValue::Node(name)),
                field("body", FieldValue::List(vec![ListItem::Node(pass)])),
            ],
        ));

        let module = tree.push(node(
            "module",
            None,
            vec![field(
                "body",
                FieldValue::List(vec![ListItem::Node(doc), ListItem::Node(func)]),
            )],
        ));
        tree.set_root(module);
        tree
    }

    #[test]
    fn test_round_trip_structure() {
        let tree = sample_tree();
        let (doc, mapping) = TreeBuilder::new(&tree, false, false).build();
        assert!(mapping.is_none());

        let root = doc.root();
        assert_eq!(doc.tag(root), "module");
        let slots = doc.slots(root);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].name, "body");
        assert_eq!(slots[0].children.len(), 2);

        let &SlotEntry::Element(func) = &slots[0].children[1] else {
            panic!("expected element entry");
        };
        assert_eq!(doc.tag(func), "function_definition");
        assert_eq!(doc.attr(func, LINE_ATTR), Some("3"));
        assert_eq!(doc.attr(func, COLUMN_ATTR), Some("0"));

        let func_slots = doc.slots(func);
        assert_eq!(func_slots[0].name, "name");
        let &SlotEntry::Element(ident) = &func_slots[0].children[0] else {
            panic!("expected element entry");
        };
        assert_eq!(doc.tag(ident), "identifier");
        // scalar field became an attribute, not a child
        assert_eq!(doc.attr(ident, "text"), Some("foo"));
        assert!(doc.slots(ident).is_empty());
    }

    #[test]
    fn test_parent_links() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let root = doc.root();
        assert!(doc.parent(root).is_none());

        let &SlotEntry::Element(func) = &doc.slots(root)[0].children[1] else {
            panic!("expected element entry");
        };
        assert_eq!(doc.parent(func), Some(root));
        let chain: Vec<_> = doc.self_and_ancestors(func).collect();
        assert_eq!(chain, vec![func, root]);
    }

    #[test]
    fn test_docstring_elision() {
        let tree = sample_tree();

        let (kept, _) = TreeBuilder::new(&tree, false, false).build();
        assert_eq!(kept.slots(kept.root())[0].children.len(), 2);

        let (elided, _) = TreeBuilder::new(&tree, true, false).build();
        let body = &elided.slots(elided.root())[0];
        assert_eq!(body.children.len(), 1);
        let &SlotEntry::Element(first) = &body.children[0] else {
            panic!("expected element entry");
        };
        assert_eq!(elided.tag(first), "function_definition");
    }

    #[test]
    fn test_docstring_not_first_is_kept() {
        let mut tree = SyntaxTree::new();
        let pass = tree.push(node("pass_statement", Some(1), vec![]));
        let doc_stmt = docstring_statement(&mut tree, 2);
        let module = tree.push(node(
            "module",
            None,
            vec![field(
                "body",
                FieldValue::List(vec![ListItem::Node(pass), ListItem::Node(doc_stmt)]),
            )],
        ));
        tree.set_root(module);

        let (doc, _) = TreeBuilder::new(&tree, true, false).build();
        assert_eq!(doc.slots(doc.root())[0].children.len(), 2);
    }

    #[test]
    fn test_docstring_ineligible_kind_is_kept() {
        let mut tree = SyntaxTree::new();
        let doc_stmt = docstring_statement(&mut tree, 2);
        let loop_node = tree.push(node(
            "while_statement",
            Some(1),
            vec![field("body", FieldValue::List(vec![ListItem::Node(doc_stmt)]))],
        ));
        let module = tree.push(node(
            "module",
            None,
            vec![field("body", FieldValue::List(vec![ListItem::Node(loop_node)]))],
        ));
        tree.set_root(module);

        let (doc, _) = TreeBuilder::new(&tree, true, false).build();
        let &SlotEntry::Element(w) = &doc.slots(doc.root())[0].children[0] else {
            panic!("expected element entry");
        };
        assert_eq!(doc.slots(w)[0].children.len(), 1);
    }

    #[test]
    fn test_literal_list_entries_become_leaves() {
        let mut tree = SyntaxTree::new();
        let cmp = tree.push(node(
            "comparison_operator",
            Some(1),
            vec![field(
                "operators",
                FieldValue::List(vec![
                    ListItem::Literal(Scalar::Str("<".into())),
                    ListItem::Literal(Scalar::Str("<=".into())),
                ]),
            )],
        ));
        let module = tree.push(node(
            "module",
            None,
            vec![field("body", FieldValue::List(vec![ListItem::Node(cmp)]))],
        ));
        tree.set_root(module);

        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let &SlotEntry::Element(cmp_elem) = &doc.slots(doc.root())[0].children[0] else {
            panic!("expected element entry");
        };
        let ops = &doc.slots(cmp_elem)[0];
        assert_eq!(ops.name, "operators");
        match (&ops.children[0], &ops.children[1]) {
            (SlotEntry::Leaf(a), SlotEntry::Leaf(b)) => {
                assert_eq!(a, "<");
                assert_eq!(b, "<=");
            }
            _ => panic!("expected leaf entries"),
        }
    }

    #[test]
    fn test_mapping_records_every_element() {
        let tree = sample_tree();
        let (doc, mapping) = TreeBuilder::new(&tree, false, true).build();
        let mapping = mapping.unwrap();
        assert_eq!(mapping.len(), doc.len());

        let &SlotEntry::Element(func) = &doc.slots(doc.root())[0].children[1] else {
            panic!("expected element entry");
        };
        assert_eq!(mapping.source_line(func, &tree), Some(3));
        // the root module has no recorded line
        assert_eq!(mapping.source_line(doc.root(), &tree), None);
    }

    #[test]
    fn test_encode_literal() {
        assert_eq!(encode_literal(&Scalar::Int(42)), "42");
        assert_eq!(encode_literal(&Scalar::Bool(false)), "false");
        assert_eq!(encode_literal(&Scalar::Str("héllo".into())), "h&#233;llo");
        assert_eq!(encode_literal(&Scalar::Str("漢".into())), "&#28450;");
        // embedded NUL collapses the whole value
        assert_eq!(encode_literal(&Scalar::Str("a\0b".into())), "");
        // tab and newline survive
        assert_eq!(encode_literal(&Scalar::Str("a\tb".into())), "a\tb");
    }

    #[test]
    fn test_conversion_never_fails_on_edge_values() {
        let mut tree = SyntaxTree::new();
        let weird = tree.push(node(
            "call",
            Some(1),
            vec![
                field("empty", FieldValue::List(vec![])),
                field("bad", FieldValue::Scalar(Scalar::Str("\u{0}".into()))),
                field("wide", FieldValue::Scalar(Scalar::Str("🦀".into()))),
            ],
        ));
        let module = tree.push(node(
            "module",
            None,
            vec![field("body", FieldValue::List(vec![ListItem::Node(weird)]))],
        ));
        tree.set_root(module);

        let (doc, _) = TreeBuilder::new(&tree, true, false).build();
        let &SlotEntry::Element(call) = &doc.slots(doc.root())[0].children[0] else {
            panic!("expected element entry");
        };
        assert_eq!(doc.attr(call, "bad"), Some(""));
        assert_eq!(doc.attr(call, "wide"), Some("&#129408;"));
        assert_eq!(doc.slots(call)[0].children.len(), 0);
    }

    #[test]
    fn test_xml_string() {
        let mut tree = SyntaxTree::new();
        let pass = tree.push(node("pass_statement", Some(1), vec![]));
        let module = tree.push(node(
            "module",
            None,
            vec![field("body", FieldValue::List(vec![ListItem::Node(pass)]))],
        ));
        tree.set_root(module);

        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let xml = doc.xml_string(doc.root());
        assert!(xml.contains("<module>"));
        assert!(xml.contains("<body>"));
        assert!(xml.contains("<pass_statement line=\"1\" column=\"0\"/>"));
    }
}
