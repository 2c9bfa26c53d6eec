//! Line resolution for query matches.
//!
//! Converts matched elements back to source line numbers. With the full
//! backend the resolver walks enclosing elements, nearest first including
//! self, and takes the first `line` attribute found. Without ancestor
//! support it falls back to the node mapping recorded during conversion.
//! Matches with no resolvable line are silently dropped; computed values
//! pass through opaque. Lines are not deduplicated here - a line matched by
//! two sub-expressions is reported twice.

use crate::document::{Document, ElementId, LINE_ATTR, NodeMapping};
use crate::query::{Match, QueryBackend};
use crate::syntax::SyntaxTree;
use crate::{Error, Result};

/// Outcome of resolving one match
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Nearest enclosing source line
    Line(u32),
    /// A value with no traceable owning node
    Opaque(String),
}

/// Resolves matches to source line numbers
pub struct LineResolver<'a> {
    doc: &'a Document,
    ancestor_lookup: bool,
    mapping: Option<(&'a NodeMapping, &'a SyntaxTree)>,
}

impl<'a> LineResolver<'a> {
    /// Resolver using the capability profile of `backend`
    pub fn new(doc: &'a Document, backend: &dyn QueryBackend) -> Self {
        Self::with_capability(doc, backend.supports_ancestor_axis())
    }

    /// Resolver with an explicit ancestor-lookup flag
    pub fn with_capability(doc: &'a Document, ancestor_lookup: bool) -> Self {
        Self {
            doc,
            ancestor_lookup,
            mapping: None,
        }
    }

    /// Attach the conversion-time node mapping consulted when ancestor
    /// lookup is unavailable
    pub fn with_mapping(mut self, mapping: &'a NodeMapping, tree: &'a SyntaxTree) -> Self {
        self.mapping = Some((mapping, tree));
        self
    }

    /// Resolve every match in order.
    ///
    /// Produces one entry per match that has a resolvable line; opaque
    /// values are passed through unchanged; everything else is dropped.
    pub fn resolve(&self, matches: &[Match]) -> Result<Vec<Resolution>> {
        let mut out = Vec::with_capacity(matches.len());
        for m in matches {
            match m.owning_element() {
                Some(element) => {
                    if let Some(line) = self.element_line(element)? {
                        out.push(Resolution::Line(line));
                    }
                }
                None => {
                    if let Match::Value(value) = m {
                        out.push(Resolution::Opaque(value.clone()));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Only the resolved line numbers, in match order
    pub fn lines(&self, matches: &[Match]) -> Result<Vec<u32>> {
        Ok(self
            .resolve(matches)?
            .into_iter()
            .filter_map(|r| match r {
                Resolution::Line(line) => Some(line),
                Resolution::Opaque(_) => None,
            })
            .collect())
    }

    fn element_line(&self, element: ElementId) -> Result<Option<u32>> {
        if self.ancestor_lookup {
            for ancestor in self.doc.self_and_ancestors(element) {
                if let Some(value) = self.doc.attr(ancestor, LINE_ATTR) {
                    return Ok(value.parse::<u32>().ok());
                }
            }
            return Ok(None);
        }

        // the element's own attribute needs no ancestor support
        if let Some(value) = self.doc.attr(element, LINE_ATTR) {
            return Ok(value.parse::<u32>().ok());
        }
        match self.mapping {
            Some((mapping, tree)) => Ok(mapping.source_line(element, tree)),
            None => Err(Error::Config(
                "line resolution requires a node mapping".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TreeBuilder;
    use crate::query::{FullBackend, QueryBackend, RestrictedBackend};
    use crate::syntax::{Field, FieldValue, ListItem, Scalar, SyntaxNode, SyntaxTree};

    fn node(kind: &str, line: Option<u32>, fields: Vec<Field>) -> SyntaxNode {
        let mut n = SyntaxNode::new(kind);
        n.line = line;
        n.fields = fields;
        n
    }

    fn field(name: &str, value: FieldValue) -> Field {
        Field {
            name: name.to_string(),
            value,
        }
    }

    /// module (no line) > function_definition@3 > identifier (no line)
    fn sample_tree() -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        let name = tree.push(node(
            "identifier",
            None,
            vec![field("text", FieldValue::Scalar(Scalar::Str("foo".into())))],
        ));
        let func = tree.push(node(
            "function_definition",
            Some(3),
            vec![field("name", FieldValue::Node(name))],
        ));
        let module = tree.push(node(
            "module",
            None,
            vec![field("body", FieldValue::List(vec![ListItem::Node(func)]))],
        ));
        tree.set_root(module);
        tree
    }

    #[test]
    fn test_ancestor_walk_finds_nearest_line() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let backend = FullBackend::new();
        let matches = backend.evaluate(&doc, "//identifier").unwrap();

        let resolver = LineResolver::new(&doc, &backend);
        assert_eq!(resolver.lines(&matches).unwrap(), vec![3]);
    }

    #[test]
    fn test_lineless_chain_is_dropped() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let backend = FullBackend::new();
        let matches = backend.evaluate(&doc, "//module").unwrap();
        assert_eq!(matches.len(), 1);

        let resolver = LineResolver::new(&doc, &backend);
        assert!(resolver.resolve(&matches).unwrap().is_empty());
    }

    #[test]
    fn test_restricted_resolution_with_mapping() {
        let tree = sample_tree();
        let (doc, mapping) = TreeBuilder::new(&tree, false, true).build();
        let mapping = mapping.unwrap();
        let backend = RestrictedBackend::new();
        let resolver = LineResolver::new(&doc, &backend).with_mapping(&mapping, &tree);

        // an element carrying its own line needs no fallback
        let matches = backend.evaluate(&doc, "//function_definition").unwrap();
        assert_eq!(resolver.lines(&matches).unwrap(), vec![3]);

        // a line-less element consults the mapping and is dropped when the
        // original node has no position either
        let matches = backend.evaluate(&doc, "//module").unwrap();
        assert!(resolver.resolve(&matches).unwrap().is_empty());
    }

    #[test]
    fn test_missing_mapping_is_a_config_error() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let backend = RestrictedBackend::new();
        // identifier carries no line attribute of its own
        let matches = backend.evaluate(&doc, "//identifier").unwrap();

        let resolver = LineResolver::new(&doc, &backend);
        let err = resolver.resolve(&matches).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("node mapping"));
    }

    #[test]
    fn test_backends_agree_on_resolved_lines() {
        let tree = sample_tree();
        let full = FullBackend::new();
        let restricted = RestrictedBackend::new();
        let (doc, mapping) = TreeBuilder::new(&tree, false, true).build();
        let mapping = mapping.unwrap();

        let expression = "//function_definition";
        let full_lines = LineResolver::new(&doc, &full)
            .lines(&full.evaluate(&doc, expression).unwrap())
            .unwrap();
        let restricted_lines = LineResolver::new(&doc, &restricted)
            .with_mapping(&mapping, &tree)
            .lines(&restricted.evaluate(&doc, expression).unwrap())
            .unwrap();
        assert_eq!(full_lines, restricted_lines);
    }

    #[test]
    fn test_opaque_value_passthrough() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let backend = FullBackend::new();
        let matches = backend.evaluate(&doc, "count(//identifier)").unwrap();

        let resolver = LineResolver::new(&doc, &backend);
        assert_eq!(
            resolver.resolve(&matches).unwrap(),
            vec![Resolution::Opaque("1".to_string())]
        );
    }

    #[test]
    fn test_multiplicity_preserved() {
        let tree = sample_tree();
        let (doc, _) = TreeBuilder::new(&tree, false, false).build();
        let backend = FullBackend::new();
        // the function and its name both resolve to line 3
        let matches = backend
            .evaluate(&doc, "//function_definition | //identifier")
            .unwrap();
        assert_eq!(matches.len(), 2);

        let resolver = LineResolver::new(&doc, &backend);
        assert_eq!(resolver.lines(&matches).unwrap(), vec![3, 3]);
    }
}
