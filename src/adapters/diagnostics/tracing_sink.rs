use crate::domain::classifier::Classification;
use crate::domain::error::AnalysisError;
use crate::domain::plan::{RecompilationPlan, ScheduleReason};
use crate::domain::ports::DiagnosticsSink;
use tracing::{debug, info, warn};

/// Forwards engine decisions to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticsSink for TracingSink {
    fn classified(&self, classification: &Classification) {
        if classification.is_unchanged() {
            debug!(class = %classification.binary_name, "unchanged");
        } else {
            info!(
                class = %classification.binary_name,
                changes = ?classification.changes,
                lost_requires = ?classification.lost_requires,
                "class changed"
            );
        }
    }

    fn scheduled(&self, unit: &str, round: usize, reason: &ScheduleReason) {
        debug!(unit, round, ?reason, "unit scheduled");
    }

    fn analysis_failed(&self, error: &AnalysisError) {
        warn!(%error, "analysis failure");
    }

    fn plan_ready(&self, plan: &RecompilationPlan) {
        info!(
            units = plan.len(),
            package_infos = plan.package_infos.len(),
            module_info = plan.includes_module_info(),
            hazards = plan.visibility_hazards.len(),
            "plan"
        );
    }
}
