//! Restricted query backend.
//!
//! Mirrors the reduced path subset of hosts without a full structural query
//! engine: tag/slot steps, `//`, wildcards, and simple predicates of the
//! forms `[@attr]`, `[@attr='value']`, `[tag]`, and `[position]`. Named
//! axes, functions, unions, and attribute-value results are rejected with a
//! capability error instead of silently returning wrong results.
//!
//! Accepted expressions delegate to the shared evaluation core, so both
//! backends agree on the common subset. Ancestor lookups are unavailable
//! here; line resolution must go through the node mapping recorded at
//! conversion time.

use crate::document::Document;
use crate::query::expr::{self, Axis, CompareOp, Expr, NodeTest, Path, Start};
use crate::query::full::Evaluator;
use crate::query::{MatchSet, QueryBackend};
use crate::{Error, Result};

const BACKEND_NAME: &str = "restricted";

/// Query backend limited to the reduced path subset
#[derive(Debug, Default)]
pub struct RestrictedBackend;

impl RestrictedBackend {
    pub fn new() -> Self {
        Self
    }
}

impl QueryBackend for RestrictedBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn supports_ancestor_axis(&self) -> bool {
        false
    }

    fn check(&self, expression: &str) -> Result<()> {
        validate(&expr::parse(expression)?)
    }

    fn evaluate(&self, doc: &Document, expression: &str) -> Result<MatchSet> {
        let parsed = expr::parse(expression)?;
        validate(&parsed)?;
        let mut evaluator = Evaluator::new(doc);
        let value = evaluator.eval_from_root(&parsed)?;
        Ok(evaluator.into_matches(value))
    }
}

fn unsupported(feature: impl Into<String>) -> Error {
    Error::Capability {
        backend: BACKEND_NAME,
        feature: feature.into(),
    }
}

fn validate(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Path(path) => validate_path(path),
        Expr::Union(..) => Err(unsupported("union expressions")),
        Expr::Or(..) | Expr::And(..) => Err(unsupported("boolean operators")),
        Expr::Compare(..) => Err(unsupported("comparisons outside predicates")),
        Expr::Call(name, _) => Err(unsupported(format!("the {}() function", name))),
        Expr::Literal(_) | Expr::Number(_) => Err(unsupported("computed values")),
    }
}

fn validate_path(path: &Path) -> Result<()> {
    for step in &path.steps {
        if step.is_implicit_descendants() {
            continue;
        }
        match step.axis {
            Axis::Child => {}
            Axis::SelfAxis | Axis::Parent => {
                // only the '.' and '..' shorthands fall in the subset
                if step.test != NodeTest::AnyNode {
                    return Err(unsupported(format!("the {} axis", step.axis.name())));
                }
            }
            Axis::Attribute => {
                return Err(unsupported("attribute selection outside predicates"));
            }
            other => return Err(unsupported(format!("the {} axis", other.name()))),
        }
        for predicate in &step.predicates {
            validate_predicate(predicate)?;
        }
    }
    Ok(())
}

fn validate_predicate(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Number(_) => Ok(()),
        Expr::Path(path) => validate_predicate_path(path),
        Expr::Compare(left, CompareOp::Eq, right) => {
            match (left.as_ref(), right.as_ref()) {
                (Expr::Path(path), Expr::Literal(_)) => validate_predicate_path(path),
                _ => Err(unsupported("comparisons other than [@attr='value']")),
            }
        }
        Expr::Compare(..) => Err(unsupported("comparisons other than [@attr='value']")),
        Expr::Call(name, _) => Err(unsupported(format!("the {}() function", name))),
        _ => Err(unsupported("complex predicates")),
    }
}

/// Predicates may reference one attribute or one child tag, nothing deeper
fn validate_predicate_path(path: &Path) -> Result<()> {
    if path.start != Start::Relative || path.steps.len() != 1 {
        return Err(unsupported("nested path predicates"));
    }
    let step = &path.steps[0];
    if !step.predicates.is_empty() {
        return Err(unsupported("nested predicates"));
    }
    match (step.axis, &step.test) {
        (Axis::Attribute, NodeTest::Name(_)) => Ok(()),
        (Axis::Child, NodeTest::Name(_)) => Ok(()),
        _ => Err(unsupported("nested path predicates")),
    }
}
