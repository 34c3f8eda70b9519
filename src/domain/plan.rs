use crate::domain::analysis::{BinaryName, ConstantRef, UnitPath};
use crate::domain::baseline::Baseline;
use crate::domain::graph::GraphInconsistency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a unit was pulled into the plan. Only the first reason is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ScheduleReason {
    /// Content hash differs from the baseline, or the unit is new.
    Edited,
    /// Unconditional first hop: holds an edge to a class of an edited unit.
    DependsOnEdited { class: BinaryName, edge: String },
    AbiChanged { class: BinaryName },
    ConstantChanged { constant: ConstantRef },
    DependencyRemoved { class: BinaryName },
    /// Held an unresolved reference to a class that now exists.
    DependencyAdded { class: BinaryName },
    /// Prior analysis is unusable; every prior dependent is suspect.
    AnalysisFailed { unit: UnitPath },
    /// A persisted edge points at a class with no analysis.
    MissingDependency { class: BinaryName },
    PackageInfo { package: String },
    ModuleInfo { module: String },
    /// Type-reference / inheritance dependent of a member pulled in by a pseudo-unit.
    PseudoNodeHop { member: BinaryName },
    /// Its module lost a `requires` on a module this unit reads from.
    VisibilityHazard { module: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedUnit {
    pub path: UnitPath,
    /// 0 for seeds and the first hop, then one per propagation round.
    pub round: usize,
    pub reason: ScheduleReason,
}

/// A consumer that may stop compiling because its module lost a `requires`. The engine only
/// schedules it; the compiler decides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisibilityHazard {
    pub consumer: BinaryName,
    pub unit: UnitPath,
    pub lost_module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub unit: UnitPath,
    pub message: String,
}

/// Recompilation Plan - what to hand the compiler, and what to persist if it succeeds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecompilationPlan {
    /// Ordered by (round, path); never contains deleted units.
    pub units: Vec<PlannedUnit>,
    pub package_infos: Vec<UnitPath>,
    pub module_infos: Vec<UnitPath>,
    pub removed_classes: BTreeSet<BinaryName>,
    pub visibility_hazards: Vec<VisibilityHazard>,
    pub analysis_failures: Vec<AnalysisFailure>,
    pub inconsistencies: Vec<GraphInconsistency>,
    pub rounds: usize,
    /// Analyses and edges to persist once the compiler succeeds.
    #[serde(skip)]
    pub next_baseline: Baseline,
}

impl RecompilationPlan {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn unit_paths(&self) -> Vec<UnitPath> {
        self.units.iter().map(|u| u.path.clone()).collect()
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u.path == unit)
    }

    pub fn includes_module_info(&self) -> bool {
        !self.module_infos.is_empty()
    }
}
