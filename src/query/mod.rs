//! Path query evaluation.
//!
//! Two interchangeable backends evaluate the same expression language at
//! different capability levels:
//! - [`FullBackend`]: arbitrary axes, predicates, and the `re:match` /
//!   `re:search` regex extension functions
//! - [`RestrictedBackend`]: tag/slot path steps only; no axes, functions,
//!   or attribute-value results
//!
//! Backend selection is explicit configuration, not ambient state, so both
//! backends can coexist in tests. The choice matters downstream: without
//! ancestor support, line resolution needs the [`crate::document::NodeMapping`]
//! recorded at conversion time.

pub mod expr;
pub mod full;
pub mod resolver;
pub mod restricted;

pub use full::FullBackend;
pub use resolver::{LineResolver, Resolution};
pub use restricted::RestrictedBackend;

use crate::Result;
use crate::document::{Document, ElementId};

/// One query match
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    /// A matched element
    Element(ElementId),
    /// A matched slot of an element
    Slot { element: ElementId, name: String },
    /// A matched literal leaf
    Leaf { element: ElementId, text: String },
    /// A matched attribute value
    Attr {
        element: ElementId,
        name: String,
        value: String,
    },
    /// A computed value with no owning node
    Value(String),
}

impl Match {
    /// Element this match descends from, if any
    pub fn owning_element(&self) -> Option<ElementId> {
        match self {
            Match::Element(element) => Some(*element),
            Match::Slot { element, .. }
            | Match::Leaf { element, .. }
            | Match::Attr { element, .. } => Some(*element),
            Match::Value(_) => None,
        }
    }
}

/// Ordered sequence of matches returned by one evaluation
pub type MatchSet = Vec<Match>;

/// Strategy interface over the two query execution models.
pub trait QueryBackend: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &'static str;

    /// True if expressions may use ancestor axes
    fn supports_ancestor_axis(&self) -> bool;

    /// Validate an expression without evaluating it.
    ///
    /// Surfaces syntax and capability errors before any file is processed.
    fn check(&self, expression: &str) -> Result<()>;

    /// Evaluate an expression against a document
    fn evaluate(&self, doc: &Document, expression: &str) -> Result<MatchSet>;
}

/// Select a backend by name
pub fn select_backend(name: &str) -> Result<Box<dyn QueryBackend>> {
    match name {
        "full" => Ok(Box::new(FullBackend::new())),
        "restricted" => Ok(Box::new(RestrictedBackend::new())),
        other => Err(crate::Error::Config(format!(
            "unknown query backend '{}' (expected 'full' or 'restricted')",
            other
        ))),
    }
}
