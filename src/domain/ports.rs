use crate::domain::analysis::{BinaryName, UnitPath};
use crate::domain::baseline::{Baseline, Snapshot};
use crate::domain::classifier::Classification;
use crate::domain::descriptor::UnitDescriptor;
use crate::domain::error::AnalysisError;
use crate::domain::plan::{RecompilationPlan, ScheduleReason};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Compiler front end port (implemented by Infrastructure)
pub trait UnitSource: Send + Sync {
    /// `{unit → content hash}` of every unit under the source roots, symlinks already resolved.
    fn snapshot(&self) -> Result<Snapshot>;

    /// Structural description of one unit.
    fn describe(&self, unit: &str) -> Result<UnitDescriptor>;
}

/// Real compiler invocation port
pub trait CompilerInvocation {
    fn compile(&self, units: &[UnitPath]) -> Result<CompileOutcome>;
}

/// What the compiler reported for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutcome {
    pub success: bool,
    /// Binary names actually written, per compiled unit.
    #[serde(default)]
    pub produced: BTreeMap<UnitPath, Vec<BinaryName>>,
    #[serde(default)]
    pub diagnostics: Vec<CompilerDiagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub unit: UnitPath,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Error,
    /// A package is no longer readable from the unit's module.
    Visibility,
}

/// Baseline persistence port
pub trait BaselineStore {
    /// `None` when no build has completed yet.
    fn load(&self) -> Result<Option<Baseline>>;

    /// Replace the stored baseline. Implementations must not leave a partial file behind.
    fn save(&self, baseline: &Baseline) -> Result<()>;
}

/// Receives engine decisions. Called from the propagator thread and, for analysis failures,
/// possibly from analysis workers.
pub trait DiagnosticsSink: Send + Sync {
    fn classified(&self, _classification: &Classification) {}

    fn scheduled(&self, _unit: &str, _round: usize, _reason: &ScheduleReason) {}

    fn analysis_failed(&self, _error: &AnalysisError) {}

    fn plan_ready(&self, _plan: &RecompilationPlan) {}
}

/// Coarse cancellation flag, checked between propagation rounds.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
