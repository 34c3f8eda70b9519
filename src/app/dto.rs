use crate::domain::analysis::{BinaryName, UnitPath};
use crate::domain::baseline::Baseline;
use crate::domain::graph::GraphInconsistency;
use crate::domain::plan::{AnalysisFailure, PlannedUnit, RecompilationPlan, VisibilityHazard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub units: Vec<PlannedUnit>,
    pub package_infos: Vec<UnitPath>,
    pub module_info: bool,
    pub removed_classes: BTreeSet<BinaryName>,
    pub visibility_hazards: Vec<VisibilityHazard>,
    pub analysis_failures: Vec<AnalysisFailure>,
    pub inconsistencies: Vec<GraphInconsistency>,
    pub rounds: usize,
    /// Whether the compiler ran and the baseline was replaced.
    pub committed: bool,
}

impl PlanResponse {
    pub fn from_plan(plan: &RecompilationPlan, committed: bool) -> Self {
        Self {
            units: plan.units.clone(),
            package_infos: plan.package_infos.clone(),
            module_info: plan.includes_module_info(),
            removed_classes: plan.removed_classes.clone(),
            visibility_hazards: plan.visibility_hazards.clone(),
            analysis_failures: plan.analysis_failures.clone(),
            inconsistencies: plan.inconsistencies.clone(),
            rounds: plan.rounds,
            committed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub version: u32,
    pub unit_count: usize,
    pub class_count: usize,
    pub classes_by_kind: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub inconsistencies: Vec<GraphInconsistency>,
}

impl BaselineSummary {
    pub fn from_baseline(baseline: &Baseline) -> Self {
        let mut classes_by_kind = BTreeMap::new();
        for analysis in baseline.classes.values() {
            *classes_by_kind
                .entry(analysis.kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        let graph = baseline.graph();
        Self {
            version: baseline.version,
            unit_count: baseline.units.len(),
            class_count: baseline.classes.len(),
            classes_by_kind,
            edges_by_kind: graph
                .edge_summary()
                .into_iter()
                .map(|(kind, count)| (kind.to_string(), count))
                .collect(),
            inconsistencies: graph.inconsistencies().to_vec(),
        }
    }
}
