//! Full query backend.
//!
//! Evaluates the complete expression language: all axes, predicates with
//! position semantics, comparisons, node-set functions, unions, and the
//! `re:match` / `re:search` regex predicates. Node-sets are produced in
//! document order without duplicates.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::document::{Document, ElementId, ITEM_TAG, SlotEntry};
use crate::query::expr::{self, Axis, CompareOp, Expr, NodeTest, Path, Start};
use crate::query::{Match, MatchSet, QueryBackend};
use crate::{Error, Result};

/// Query backend with the complete expression feature set
#[derive(Debug, Default)]
pub struct FullBackend;

impl FullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl QueryBackend for FullBackend {
    fn name(&self) -> &'static str {
        "full"
    }

    fn supports_ancestor_axis(&self) -> bool {
        true
    }

    fn check(&self, expression: &str) -> Result<()> {
        expr::parse(expression).map(|_| ())
    }

    fn evaluate(&self, doc: &Document, expression: &str) -> Result<MatchSet> {
        let parsed = expr::parse(expression)?;
        let mut evaluator = Evaluator::new(doc);
        let context = Context {
            node: NodeRef::Element(doc.root()),
            position: 1,
            size: 1,
        };
        let value = evaluator.eval(&parsed, &context)?;
        Ok(evaluator.into_matches(value))
    }
}

/// Handle to any addressable node during evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NodeRef {
    /// The virtual document node above the root element
    Doc,
    Element(ElementId),
    /// Owning element, slot index
    Slot(ElementId, u32),
    /// Owning element, slot index, child index
    Leaf(ElementId, u32, u32),
    /// Owning element, attribute index
    Attr(ElementId, u32),
}

/// Intermediate evaluation result
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Nodes(Vec<NodeRef>),
    Text(String),
    Num(f64),
    Bool(bool),
}

struct Context {
    node: NodeRef,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    doc: &'a Document,
    regexes: HashMap<(bool, String), Regex>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            regexes: HashMap::new(),
        }
    }

    /// Evaluate a parsed expression with the document root as context.
    pub(crate) fn eval_from_root(&mut self, expr: &Expr) -> Result<Value> {
        let context = Context {
            node: NodeRef::Element(self.doc.root()),
            position: 1,
            size: 1,
        };
        self.eval(expr, &context)
    }

    fn eval(&mut self, expr: &Expr, context: &Context) -> Result<Value> {
        match expr {
            Expr::Path(path) => Ok(Value::Nodes(self.eval_path(path, context)?)),
            Expr::Union(left, right) => {
                let left = self.eval_nodes(left, context)?;
                let right = self.eval_nodes(right, context)?;
                let mut seen: HashSet<NodeRef> = HashSet::new();
                let mut merged = Vec::with_capacity(left.len() + right.len());
                for node in left.into_iter().chain(right) {
                    if seen.insert(node) {
                        merged.push(node);
                    }
                }
                Ok(Value::Nodes(merged))
            }
            Expr::Or(left, right) => {
                let lhs = self.eval(left, context)?;
                if boolean(&lhs) {
                    return Ok(Value::Bool(true));
                }
                let rhs = self.eval(right, context)?;
                Ok(Value::Bool(boolean(&rhs)))
            }
            Expr::And(left, right) => {
                let lhs = self.eval(left, context)?;
                if !boolean(&lhs) {
                    return Ok(Value::Bool(false));
                }
                let rhs = self.eval(right, context)?;
                Ok(Value::Bool(boolean(&rhs)))
            }
            Expr::Compare(left, op, right) => {
                let lhs = self.eval(left, context)?;
                let rhs = self.eval(right, context)?;
                Ok(Value::Bool(self.compare(&lhs, *op, &rhs)))
            }
            Expr::Call(name, args) => self.call(name, args, context),
            Expr::Literal(text) => Ok(Value::Text(text.clone())),
            Expr::Number(value) => Ok(Value::Num(*value)),
        }
    }

    fn eval_nodes(&mut self, expr: &Expr, context: &Context) -> Result<Vec<NodeRef>> {
        match self.eval(expr, context)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(Error::Query(
                "expected a node-set, found a computed value".into(),
            )),
        }
    }

    fn eval_path(&mut self, path: &Path, context: &Context) -> Result<Vec<NodeRef>> {
        let mut current = match path.start {
            Start::Root => vec![NodeRef::Doc],
            Start::Relative => vec![context.node],
        };

        for step in &path.steps {
            let mut next = Vec::new();
            let mut seen: HashSet<NodeRef> = HashSet::new();
            for &node in &current {
                let mut candidates: Vec<NodeRef> = self
                    .axis_nodes(node, step.axis)
                    .into_iter()
                    .filter(|c| self.test_matches(*c, step.axis, &step.test))
                    .collect();

                // Predicates filter left to right; positions renumber after
                // each one. Reverse axes were generated nearest-first, so a
                // position of 1 selects the closest node.
                for predicate in &step.predicates {
                    let size = candidates.len();
                    let mut kept = Vec::with_capacity(size);
                    for (index, &candidate) in candidates.iter().enumerate() {
                        let inner = Context {
                            node: candidate,
                            position: index + 1,
                            size,
                        };
                        let value = self.eval(predicate, &inner)?;
                        if predicate_truth(&value, index + 1) {
                            kept.push(candidate);
                        }
                    }
                    candidates = kept;
                }

                for candidate in candidates {
                    if seen.insert(candidate) {
                        next.push(candidate);
                    }
                }
            }
            current = next;
        }

        Ok(current)
    }

    fn axis_nodes(&self, node: NodeRef, axis: Axis) -> Vec<NodeRef> {
        match axis {
            Axis::Child => self.children(node),
            Axis::Descendant => {
                let mut out = Vec::new();
                self.collect_descendants(node, &mut out);
                out
            }
            Axis::DescendantOrSelf => {
                let mut out = vec![node];
                self.collect_descendants(node, &mut out);
                out
            }
            Axis::SelfAxis => vec![node],
            Axis::Parent => self.parent(node).into_iter().collect(),
            Axis::Ancestor => {
                let mut out = Vec::new();
                let mut cursor = self.parent(node);
                while let Some(current) = cursor {
                    out.push(current);
                    cursor = self.parent(current);
                }
                out
            }
            Axis::AncestorOrSelf => {
                let mut out = vec![node];
                let mut cursor = self.parent(node);
                while let Some(current) = cursor {
                    out.push(current);
                    cursor = self.parent(current);
                }
                out
            }
            Axis::Attribute => match node {
                NodeRef::Element(element) => (0..self.doc.attrs(element).len())
                    .map(|i| NodeRef::Attr(element, i as u32))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        match node {
            NodeRef::Doc => vec![NodeRef::Element(self.doc.root())],
            NodeRef::Element(element) => (0..self.doc.slots(element).len())
                .map(|i| NodeRef::Slot(element, i as u32))
                .collect(),
            NodeRef::Slot(element, slot) => self.doc.slots(element)[slot as usize]
                .children
                .iter()
                .enumerate()
                .map(|(i, entry)| match entry {
                    SlotEntry::Element(child) => NodeRef::Element(*child),
                    SlotEntry::Leaf(_) => NodeRef::Leaf(element, slot, i as u32),
                })
                .collect(),
            NodeRef::Leaf(..) | NodeRef::Attr(..) => Vec::new(),
        }
    }

    fn collect_descendants(&self, node: NodeRef, out: &mut Vec<NodeRef>) {
        for child in self.children(node) {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        match node {
            NodeRef::Doc => None,
            NodeRef::Element(element) => match self.doc.parent_slot(element) {
                Some((parent, slot)) => Some(NodeRef::Slot(parent, slot as u32)),
                None => Some(NodeRef::Doc),
            },
            NodeRef::Slot(element, _) => Some(NodeRef::Element(element)),
            NodeRef::Leaf(element, slot, _) => Some(NodeRef::Slot(element, slot)),
            NodeRef::Attr(element, _) => Some(NodeRef::Element(element)),
        }
    }

    fn test_matches(&self, candidate: NodeRef, axis: Axis, test: &NodeTest) -> bool {
        if axis == Axis::Attribute {
            let NodeRef::Attr(element, index) = candidate else {
                return false;
            };
            return match test {
                NodeTest::Any | NodeTest::AnyNode => true,
                NodeTest::Name(name) => self.doc.attrs(element)[index as usize].0 == *name,
            };
        }
        match test {
            NodeTest::AnyNode => !matches!(candidate, NodeRef::Attr(..)),
            NodeTest::Any => matches!(
                candidate,
                NodeRef::Element(_) | NodeRef::Slot(..) | NodeRef::Leaf(..)
            ),
            NodeTest::Name(name) => match candidate {
                NodeRef::Element(element) => self.doc.tag(element) == name,
                NodeRef::Slot(element, slot) => {
                    self.doc.slots(element)[slot as usize].name == *name
                }
                NodeRef::Leaf(..) => name == ITEM_TAG,
                NodeRef::Doc | NodeRef::Attr(..) => false,
            },
        }
    }

    pub(crate) fn string_value(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.append_text(node, &mut out);
        out
    }

    fn append_text(&self, node: NodeRef, out: &mut String) {
        match node {
            NodeRef::Doc => self.append_text(NodeRef::Element(self.doc.root()), out),
            NodeRef::Element(element) => {
                for slot in 0..self.doc.slots(element).len() {
                    self.append_text(NodeRef::Slot(element, slot as u32), out);
                }
            }
            NodeRef::Slot(element, slot) => {
                for entry in &self.doc.slots(element)[slot as usize].children {
                    match entry {
                        SlotEntry::Element(child) => {
                            self.append_text(NodeRef::Element(*child), out)
                        }
                        SlotEntry::Leaf(text) => out.push_str(text),
                    }
                }
            }
            NodeRef::Leaf(element, slot, index) => {
                if let SlotEntry::Leaf(text) =
                    &self.doc.slots(element)[slot as usize].children[index as usize]
                {
                    out.push_str(text);
                }
            }
            NodeRef::Attr(element, index) => {
                out.push_str(&self.doc.attrs(element)[index as usize].1);
            }
        }
    }

    fn compare(&mut self, left: &Value, op: CompareOp, right: &Value) -> bool {
        if matches!(op, CompareOp::Eq | CompareOp::Ne) {
            if matches!(left, Value::Bool(_)) || matches!(right, Value::Bool(_)) {
                let equal = boolean(left) == boolean(right);
                return if op == CompareOp::Eq { equal } else { !equal };
            }
            let numeric = matches!(left, Value::Num(_)) || matches!(right, Value::Num(_));
            let lhs = self.candidate_strings(left);
            let rhs = self.candidate_strings(right);
            return lhs.iter().any(|a| {
                rhs.iter().any(|b| {
                    let equal = if numeric {
                        match (a.parse::<f64>(), b.parse::<f64>()) {
                            (Ok(x), Ok(y)) => x == y,
                            _ => false,
                        }
                    } else {
                        a == b
                    };
                    if op == CompareOp::Eq { equal } else { !equal }
                })
            });
        }

        // relational comparisons are numeric and existential over node-sets
        let lhs = self.candidate_strings(left);
        let rhs = self.candidate_strings(right);
        lhs.iter().any(|a| {
            rhs.iter().any(|b| match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(x), Ok(y)) => match op {
                    CompareOp::Lt => x < y,
                    CompareOp::Le => x <= y,
                    CompareOp::Gt => x > y,
                    CompareOp::Ge => x >= y,
                    CompareOp::Eq | CompareOp::Ne => unreachable!(),
                },
                _ => false,
            })
        })
    }

    /// Strings a value contributes to comparisons and regex predicates
    fn candidate_strings(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Nodes(nodes) => nodes.iter().map(|n| self.string_value(*n)).collect(),
            Value::Text(text) => vec![text.clone()],
            Value::Num(n) => vec![format_number(*n)],
            Value::Bool(b) => vec![b.to_string()],
        }
    }

    fn call(&mut self, name: &str, args: &[Expr], context: &Context) -> Result<Value> {
        match name {
            "not" => {
                let [arg] = args else {
                    return Err(arity_error(name, 1));
                };
                let value = self.eval(arg, context)?;
                Ok(Value::Bool(!boolean(&value)))
            }
            "count" => {
                let [arg] = args else {
                    return Err(arity_error(name, 1));
                };
                let nodes = self.eval_nodes(arg, context)?;
                Ok(Value::Num(nodes.len() as f64))
            }
            "contains" => {
                let [haystack, needle] = args else {
                    return Err(arity_error(name, 2));
                };
                let haystack = self.eval(haystack, context)?;
                let needle = self.eval(needle, context)?;
                Ok(Value::Bool(
                    self.string(&haystack).contains(&self.string(&needle)),
                ))
            }
            "starts-with" => {
                let [text, prefix] = args else {
                    return Err(arity_error(name, 2));
                };
                let text = self.eval(text, context)?;
                let prefix = self.eval(prefix, context)?;
                Ok(Value::Bool(
                    self.string(&text).starts_with(&self.string(&prefix)),
                ))
            }
            "string" => {
                let [arg] = args else {
                    return Err(arity_error(name, 1));
                };
                let value = self.eval(arg, context)?;
                Ok(Value::Text(self.string(&value)))
            }
            "last" => {
                if !args.is_empty() {
                    return Err(arity_error(name, 0));
                }
                Ok(Value::Num(context.size as f64))
            }
            "position" => {
                if !args.is_empty() {
                    return Err(arity_error(name, 0));
                }
                Ok(Value::Num(context.position as f64))
            }
            "re:match" => self.regex_predicate(args, context, true),
            "re:search" => self.regex_predicate(args, context, false),
            other => Err(Error::Query(format!("unknown function '{}'", other))),
        }
    }

    /// `re:match` / `re:search`: true iff the pattern matches at least one
    /// candidate string. `re:match` anchors at the start of the candidate.
    fn regex_predicate(&mut self, args: &[Expr], context: &Context, anchored: bool) -> Result<Value> {
        let name = if anchored { "re:match" } else { "re:search" };
        let [pattern, candidates] = args else {
            return Err(arity_error(name, 2));
        };
        let pattern = {
            let value = self.eval(pattern, context)?;
            self.string(&value)
        };
        let candidates = {
            let value = self.eval(candidates, context)?;
            self.candidate_strings(&value)
        };

        let key = (anchored, pattern.clone());
        if !self.regexes.contains_key(&key) {
            let source = if anchored {
                format!("^(?:{})", pattern)
            } else {
                pattern.clone()
            };
            let compiled = Regex::new(&source)
                .map_err(|e| Error::Query(format!("invalid regex '{}': {}", pattern, e)))?;
            self.regexes.insert(key.clone(), compiled);
        }
        let regex = &self.regexes[&key];
        Ok(Value::Bool(candidates.iter().any(|c| regex.is_match(c))))
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|n| self.string_value(*n))
                .unwrap_or_default(),
            Value::Text(text) => text.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    pub(crate) fn into_matches(self, value: Value) -> MatchSet {
        match value {
            Value::Nodes(nodes) => nodes.into_iter().map(|n| self.node_to_match(n)).collect(),
            Value::Text(text) => vec![Match::Value(text)],
            Value::Num(n) => vec![Match::Value(format_number(n))],
            Value::Bool(b) => vec![Match::Value(b.to_string())],
        }
    }

    fn node_to_match(&self, node: NodeRef) -> Match {
        match node {
            NodeRef::Doc => Match::Element(self.doc.root()),
            NodeRef::Element(element) => Match::Element(element),
            NodeRef::Slot(element, slot) => Match::Slot {
                element,
                name: self.doc.slots(element)[slot as usize].name.clone(),
            },
            NodeRef::Leaf(element, slot, index) => {
                let text = match &self.doc.slots(element)[slot as usize].children[index as usize] {
                    SlotEntry::Leaf(text) => text.clone(),
                    SlotEntry::Element(_) => String::new(),
                };
                Match::Leaf { element, text }
            }
            NodeRef::Attr(element, index) => {
                let (name, value) = &self.doc.attrs(element)[index as usize];
                Match::Attr {
                    element,
                    name: name.clone(),
                    value: value.clone(),
                }
            }
        }
    }
}

fn boolean(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Text(text) => !text.is_empty(),
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Bool(b) => *b,
    }
}

/// Predicate truthiness: a bare number is a position test
fn predicate_truth(value: &Value, position: usize) -> bool {
    match value {
        Value::Num(n) => *n == position as f64,
        other => boolean(other),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn arity_error(name: &str, expected: usize) -> Error {
    Error::Query(format!(
        "function '{}' expects {} argument{}",
        name,
        expected,
        if expected == 1 { "" } else { "s" }
    ))
}
