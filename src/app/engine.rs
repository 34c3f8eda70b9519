use crate::app::config::EngineConfig;
use crate::domain::analysis::UnitPath;
use crate::domain::analyzer::ClassAnalyzer;
use crate::domain::baseline::{Baseline, Snapshot};
use crate::domain::error::{BuildError, PropagationError};
use crate::domain::plan::RecompilationPlan;
use crate::domain::ports::{
    BaselineStore, CancellationToken, CompileOutcome, CompilerInvocation, DiagnosticKind,
    DiagnosticsSink, UnitSource,
};
use crate::domain::propagator::{ImpactPropagator, PropagationContext};
use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub plan: RecompilationPlan,
    /// Units compiled in total, including those added by reconciliation.
    pub compiled: Vec<UnitPath>,
    pub baseline_replaced: bool,
}

/// Orchestrates one incremental build over the ports.
#[derive(Clone)]
pub struct IncrementalEngine {
    config: EngineConfig,
    source: Arc<dyn UnitSource>,
    store: Arc<dyn BaselineStore + Send + Sync>,
    sink: Arc<dyn DiagnosticsSink>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl IncrementalEngine {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn UnitSource>,
        store: Arc<dyn BaselineStore + Send + Sync>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        let pool = match config.worker_threads {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .context("Failed to build analysis thread pool")?,
            )),
            None => None,
        };
        Ok(Self {
            config,
            source,
            store,
            sink,
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn prepare(&self) -> Result<(Baseline, Snapshot), BuildError> {
        let baseline = self
            .store
            .load()
            .map_err(BuildError::Store)?
            .unwrap_or_default();
        let snapshot = self.source.snapshot().map_err(|source| BuildError::Source {
            unit: "<snapshot>".to_string(),
            source,
        })?;
        Ok((baseline, snapshot))
    }

    /// Compute the plan without compiling or persisting anything.
    pub fn plan(&self, cancel: &CancellationToken) -> Result<RecompilationPlan, BuildError> {
        let (baseline, snapshot) = self.prepare()?;
        let analyzer = ClassAnalyzer::with_parallel_threshold(self.config.parallel_threshold);
        let mut propagator =
            ImpactPropagator::new(self.context(&baseline, &snapshot, &analyzer, cancel));
        let diff = baseline.diff(&snapshot);
        info!(
            edited = diff.edited.len(),
            deleted = diff.deleted.len(),
            "snapshot compared with baseline"
        );
        self.in_pool(|| propagator.propagate(&diff))
    }

    /// Plan, compile, reconcile what the compiler produced, and replace the baseline only when
    /// every compiler invocation succeeded.
    pub fn build(
        &self,
        compiler: &dyn CompilerInvocation,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let (baseline, snapshot) = self.prepare()?;
        let analyzer = ClassAnalyzer::with_parallel_threshold(self.config.parallel_threshold);
        let mut propagator =
            ImpactPropagator::new(self.context(&baseline, &snapshot, &analyzer, cancel));
        let diff = baseline.diff(&snapshot);
        let plan = self.in_pool(|| propagator.propagate(&diff))?;

        let mut pending = plan.unit_paths();
        let mut compiled = Vec::new();
        let mut invocations = 0;
        while !pending.is_empty() {
            invocations += 1;
            if invocations > self.config.max_rounds {
                return Err(PropagationError::NonTermination {
                    rounds: self.config.max_rounds,
                }
                .into());
            }
            info!(units = pending.len(), "invoking compiler");
            let outcome = compiler.compile(&pending).map_err(BuildError::Compiler)?;
            check_outcome(&outcome)?;
            compiled.append(&mut pending);
            pending = self.in_pool(|| propagator.reconcile(&outcome.produced))?;
            if !pending.is_empty() {
                warn!(
                    units = pending.len(),
                    "compiler output disagreed with analysis, compiling more units"
                );
            }
        }

        let plan = propagator.plan();
        let baseline_replaced = plan.next_baseline != baseline;
        if baseline_replaced {
            self.store
                .save(&plan.next_baseline)
                .map_err(BuildError::Store)?;
            info!(
                classes = plan.next_baseline.classes.len(),
                edges = plan.next_baseline.edges.len(),
                "baseline replaced"
            );
        }
        Ok(BuildOutcome {
            plan,
            compiled,
            baseline_replaced,
        })
    }

    fn context<'a>(
        &'a self,
        baseline: &'a Baseline,
        snapshot: &'a Snapshot,
        analyzer: &'a ClassAnalyzer,
        cancel: &CancellationToken,
    ) -> PropagationContext<'a> {
        PropagationContext {
            baseline,
            snapshot,
            source: self.source.as_ref(),
            analyzer,
            sink: self.sink.as_ref(),
            cancel: cancel.clone(),
            max_rounds: self.config.max_rounds,
        }
    }

    fn in_pool<T: Send>(&self, op: impl FnOnce() -> T + Send) -> T {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Visibility failures are surfaced verbatim against the unit the compiler blamed.
fn check_outcome(outcome: &CompileOutcome) -> Result<(), BuildError> {
    if outcome.success {
        return Ok(());
    }
    if let Some(diagnostic) = outcome
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::Visibility)
    {
        return Err(BuildError::Visibility {
            unit: diagnostic.unit.clone(),
            message: diagnostic.message.clone(),
        });
    }
    Err(BuildError::CompileFailed {
        units: outcome.diagnostics.iter().map(|d| d.unit.clone()).collect(),
        message: outcome
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    })
}
