//! JavaScript language adapter.
//!
//! Same normalization as the Python adapter with the grammar's own wrapper
//! kinds: statement blocks and class bodies are spliced into the field that
//! held them.

use std::sync::Mutex;

use tree_sitter::Parser;

use super::framework::{LanguageAdapter, Normalization, check_syntax, convert_tree};
use crate::syntax::SyntaxTree;
use crate::{Error, Result};

const NORMALIZATION: Normalization = Normalization {
    statement_wrappers: &["statement_block", "class_body"],
    body_roots: &["program"],
};

/// JavaScript language adapter
pub struct JavaScriptAdapter {
    parser: Mutex<Parser>,
}

impl JavaScriptAdapter {
    /// Create a new JavaScript adapter
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .expect("JavaScript grammar is incompatible with the linked tree-sitter");
        Self {
            parser: Mutex::new(parser),
        }
    }
}

impl Default for JavaScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for JavaScriptAdapter {
    fn language_name(&self) -> &str {
        "JavaScript"
    }

    fn file_extensions(&self) -> &[&str] {
        &["js", "mjs", "cjs", "jsx"]
    }

    fn parse(&self, source: &str) -> Result<SyntaxTree> {
        let mut parser = self
            .parser
            .lock()
            .map_err(|_| Error::Adapter("JavaScript parser lock poisoned".into()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::Parse("parser produced no tree".into()))?;
        check_syntax(tree.root_node())?;
        Ok(convert_tree(tree.root_node(), source, &NORMALIZATION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{FieldValue, ListItem};

    #[test]
    fn test_program_shape() {
        let adapter = JavaScriptAdapter::new();
        let tree = adapter.parse("function foo() { return 1; }\n").unwrap();

        let root = tree.node(tree.root());
        assert_eq!(root.kind, "program");
        let Some(FieldValue::List(body)) = root.field("body") else {
            panic!("expected program body list");
        };
        let &ListItem::Node(func_id) = &body[0] else {
            panic!("expected node entry");
        };
        let func = tree.node(func_id);
        assert_eq!(func.kind, "function_declaration");

        // the statement block is spliced away
        let Some(FieldValue::List(statements)) = func.field("body") else {
            panic!("expected spliced body list");
        };
        assert_eq!(statements.len(), 1);
        let &ListItem::Node(ret_id) = &statements[0] else {
            panic!("expected node entry");
        };
        assert_eq!(tree.node(ret_id).kind, "return_statement");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let adapter = JavaScriptAdapter::new();
        assert!(matches!(
            adapter.parse("function ( {\n").unwrap_err(),
            Error::Parse(_)
        ));
    }
}
