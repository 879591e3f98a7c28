//! Error types for reconciliation and measure scoring.
//!
//! Every variant is fatal for a single (query, measure) computation. The
//! driver reports it and moves on to the next query.

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// Which input collection an error refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Collection {
    Judgments,
    Results,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Judgments => "judgments",
            Self::Results => "results",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while reconciling a query or scoring it.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Input collection tagged with an unexpected schema
    #[error("{collection} format mismatch: expected {expected}, found {found}")]
    FormatMismatch {
        collection: Collection,
        expected: String,
        found: String,
    },
    /// Same document id appears twice in one collection of a query
    #[error("duplicate document {document_id} in {collection} for query {query_id}")]
    DuplicateDocument {
        query_id: String,
        document_id: String,
        collection: Collection,
    },
    /// Scratch buffer growth failed
    #[error("failed to grow {buffer} buffer to {requested} entries")]
    AllocationFailure {
        buffer: &'static str,
        requested: usize,
        source: TryReserveError,
    },
    /// No positive-gain judged document exists for an aspect
    #[error("ideal DCG is zero for aspect {aspect} of query {query_id}")]
    ZeroIdealGain { query_id: String, aspect: usize },
    /// Measure name not present in the registry
    #[error("unknown measure: {0}")]
    UnknownMeasure(String),
    /// Measure parameters could not be parsed or are not accepted
    #[error("invalid parameters for measure {measure}: {reason}")]
    InvalidParameter { measure: String, reason: String },
}

impl EvalError {
    pub(crate) fn aspect_mismatch(expected: usize, found: usize) -> Self {
        Self::FormatMismatch {
            collection: Collection::Judgments,
            expected: format!("{expected} aspects"),
            found: format!("{found} aspects"),
        }
    }
}

/// Reserve room for `additional` more entries, mapping failure to
/// [`EvalError::AllocationFailure`].
pub(crate) fn try_grow<T>(
    buffer: &mut Vec<T>,
    additional: usize,
    name: &'static str,
) -> Result<(), EvalError> {
    buffer
        .try_reserve(additional)
        .map_err(|source| EvalError::AllocationFailure {
            buffer: name,
            requested: buffer.len().saturating_add(additional),
            source,
        })
}
