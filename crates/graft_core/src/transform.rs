//! Transform pipeline adapter over the external rewriting engine.
//!
//! # Responsibility
//! - Invoke registered code transformers on raw unit bytes before they are
//!   defined.
//! - Report whether any transformer actually rewrote the unit.
//!
//! # Invariants
//! - Transformation is a pure function of (unit name, raw bytes); the only
//!   tolerated side effect is a transformer triggering nested loads.
//! - A declined transformation leaves the raw bytes untouched.

use crate::model::name::UnitName;
use std::sync::Arc;

/// One registered code transformer.
///
/// Returns `None` to decline, or the rewritten bytes.
pub trait CodeTransformer: Send + Sync {
    fn transform(&self, name: &UnitName, bytes: &[u8]) -> Option<Vec<u8>>;
}

/// Outcome of running the pipeline over one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Every transformer declined.
    Unchanged,
    /// At least one transformer rewrote the unit.
    Transformed(Vec<u8>),
}

/// Ordered pipeline of code transformers.
#[derive(Default, Clone)]
pub struct TransformPipeline {
    transformers: Vec<Arc<dyn CodeTransformer>>,
}

impl TransformPipeline {
    pub fn new(transformers: Vec<Arc<dyn CodeTransformer>>) -> Self {
        Self { transformers }
    }

    /// Pipeline that never rewrites anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Applies every transformer in order over the evolving bytes.
    pub fn apply(&self, name: &UnitName, bytes: &[u8]) -> TransformOutcome {
        let mut current: Option<Vec<u8>> = None;
        for transformer in &self.transformers {
            let input = current.as_deref().unwrap_or(bytes);
            if let Some(rewritten) = transformer.transform(name, input) {
                current = Some(rewritten);
            }
        }
        match current {
            Some(rewritten) => TransformOutcome::Transformed(rewritten),
            None => TransformOutcome::Unchanged,
        }
    }
}
