//! Python language adapter.
//!
//! Parses Python source with tree-sitter. Statement blocks are spliced into
//! the field that held them, so `function_definition/body` contains the
//! statements directly, the way the logical AST reads.

use std::sync::Mutex;

use tree_sitter::Parser;

use super::framework::{LanguageAdapter, Normalization, check_syntax, convert_tree};
use crate::syntax::SyntaxTree;
use crate::{Error, Result};

const NORMALIZATION: Normalization = Normalization {
    statement_wrappers: &["block"],
    body_roots: &["module"],
};

/// Python language adapter
pub struct PythonAdapter {
    parser: Mutex<Parser>,
}

impl PythonAdapter {
    /// Create a new Python adapter
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("Python grammar is incompatible with the linked tree-sitter");
        Self {
            parser: Mutex::new(parser),
        }
    }
}

impl Default for PythonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for PythonAdapter {
    fn language_name(&self) -> &str {
        "Python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn parse(&self, source: &str) -> Result<SyntaxTree> {
        let mut parser = self
            .parser
            .lock()
            .map_err(|_| Error::Adapter("Python parser lock poisoned".into()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::Parse("parser produced no tree".into()))?;
        check_syntax(tree.root_node())?;
        Ok(convert_tree(tree.root_node(), source, &NORMALIZATION))
    }
}
