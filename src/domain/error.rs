//! Error taxonomy of the decision engine.
//!
//! Only [`PropagationError`] and [`BuildError`] abort a build. Analysis failures and graph
//! inconsistencies are recovered by over-recompiling and are reported on the plan instead.

use thiserror::Error;

use crate::domain::analysis::{ConstantRef, UnitPath};

/// A unit could not be turned into class analyses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("{unit}: front end could not parse the unit: {message}")]
    Unparseable { unit: UnitPath, message: String },

    #[error("{unit}: malformed declaration: {reason}")]
    Malformed { unit: UnitPath, reason: String },

    #[error("cyclic constant initializer through {0}")]
    ConstantCycle(ConstantRef),
}

impl AnalysisError {
    pub fn malformed(unit: &str, reason: impl Into<String>) -> Self {
        AnalysisError::Malformed {
            unit: unit.to_string(),
            reason: reason.into(),
        }
    }
}

/// Fatal conditions of the fixpoint loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropagationError {
    /// Normal operation always terminates; hitting the cap means the graph was built wrong.
    #[error("propagation did not reach a fixpoint within {rounds} rounds")]
    NonTermination { rounds: usize },

    #[error("build cancelled during propagation round {round}")]
    Cancelled { round: usize },
}

/// Why a build ended without replacing the baseline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Propagation(#[from] PropagationError),

    /// The compiler reported that a package is no longer visible (e.g. a `requires` was
    /// removed). Surfaced verbatim against the unit the compiler blamed.
    #[error("{unit}: {message}")]
    Visibility { unit: UnitPath, message: String },

    #[error("compilation failed in {}: {message}", .units.join(", "))]
    CompileFailed { units: Vec<UnitPath>, message: String },

    #[error("compiler collaborator failed")]
    Compiler(#[source] anyhow::Error),

    #[error("could not read source unit {unit}")]
    Source {
        unit: UnitPath,
        #[source]
        source: anyhow::Error,
    },

    #[error("baseline store failed")]
    Store(#[source] anyhow::Error),
}
