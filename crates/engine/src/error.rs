//! Error taxonomy for the engine boundary.
//!
//! Everything here is recoverable at single-cell granularity; no variant ever
//! aborts a recalculation pass. `CellError` is the per-cell state the host UI
//! renders; `EngineError` is what boundary calls return.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recalc::CycleReport;

/// Per-cell error state. Overrides the cell's display value when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellError {
    /// The cell's raw input looked like a formula but did not parse.
    Syntax,
    /// The cell participates in (or introduced) a circular reference.
    Cycle,
}

impl CellError {
    /// Short display token for the host UI.
    pub fn token(self) -> &'static str {
        match self {
            CellError::Syntax => "#SYNTAX!",
            CellError::Cycle => "#CYCLE!",
        }
    }
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Errors surfaced by engine boundary operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// An address or range token could not be resolved to coordinates.
    /// When raised inside a formula, it folds into `FormulaSyntax` on the
    /// owning cell.
    #[error("malformed reference: {token}")]
    MalformedReference { token: String },

    /// The formula body failed to parse. Carries the offending fragment and
    /// its byte offset within the formula body (after the `=` marker).
    #[error("syntax error at offset {position}: {detail} (near \"{fragment}\")")]
    FormulaSyntax {
        fragment: String,
        position: usize,
        detail: String,
    },

    /// The edit would introduce a dependency cycle. The edit is rejected and
    /// the graph rolled back; the report names the cycle members.
    #[error("{0}")]
    CircularReference(CycleReport),

    /// Reserved for arithmetic functions outside the current fixed set.
    /// Never constructed today: none of SUM/AVERAGE/COUNT/MIN/MAX/IF divides.
    #[error("domain error: {0}")]
    DivisionOrDomain(String),
}

impl EngineError {
    /// The cell-level error state this engine error maps to.
    pub fn cell_error(&self) -> CellError {
        match self {
            EngineError::MalformedReference { .. } | EngineError::FormulaSyntax { .. } => {
                CellError::Syntax
            }
            EngineError::CircularReference(_) => CellError::Cycle,
            EngineError::DivisionOrDomain(_) => CellError::Syntax,
        }
    }
}
