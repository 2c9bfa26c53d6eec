//! # astq - structural search for source code
//!
//! astq greps syntax instead of text: it parses source files into a generic
//! labeled tree and evaluates path expressions against that tree, reporting
//! matches as `path:line` pairs with optional surrounding context.
//!
//! The pipeline:
//! - Tree-sitter based parsing with pluggable language adapters
//! - Conversion of each syntax tree into a queryable [`document::Document`]
//! - Path-query evaluation under two backend capability profiles
//! - Resolution of matches back to source line numbers

pub mod adapter;
pub mod config;
pub mod document;
pub mod query;
pub mod search;
pub mod syntax;
pub mod ui;
pub mod walk;

// Re-exports for convenient access
pub use document::{Document, ElementId, NodeMapping, TreeBuilder};
pub use query::{Match, MatchSet, QueryBackend, select_backend};
pub use search::{SearchCoordinator, SearchHit, SearchOptions};
pub use syntax::{NodeId, SyntaxTree};

/// Result type alias for astq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for astq operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("The {backend} backend does not support {feature}")]
    Capability {
        backend: &'static str,
        feature: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Adapter error: {0}")]
    Adapter(String),
}
