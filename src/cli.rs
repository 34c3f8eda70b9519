use crate::adapters::compiler::dry_run::DryRunCompiler;
use crate::adapters::diagnostics::tracing_sink::TracingSink;
use crate::adapters::source::json::JsonUnitSource;
use crate::adapters::store::json::JsonBaselineStore;
use crate::app::config::EngineConfig;
use crate::app::dto::{BaselineSummary, PlanResponse};
use crate::app::engine::IncrementalEngine;
use crate::domain::ports::{BaselineStore, CancellationToken, UnitSource};
use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

/// Flags that override values from the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_rounds: Option<usize>,
    pub parallel_threshold: Option<usize>,
    pub worker_threads: Option<usize>,
}

pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<EngineConfig> {
    let mut config = EngineConfig::load_or_default(path)?;
    if let Some(max_rounds) = overrides.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(threshold) = overrides.parallel_threshold {
        config.parallel_threshold = threshold;
    }
    if overrides.worker_threads.is_some() {
        config.worker_threads = overrides.worker_threads;
    }
    Ok(config)
}

/// Compute a plan for the workspace; with `commit`, run the dry-run compiler and persist the
/// new baseline.
pub fn run_plan(
    workspace: &Path,
    baseline: &Path,
    config: EngineConfig,
    commit: bool,
    json: bool,
) -> Result<()> {
    let source: Arc<dyn UnitSource> = Arc::new(JsonUnitSource::load(workspace)?);
    let store = Arc::new(JsonBaselineStore::new(baseline));
    let engine =
        IncrementalEngine::new(config, Arc::clone(&source), store, Arc::new(TracingSink))?;
    let cancel = CancellationToken::new();

    let response = if commit {
        let compiler = DryRunCompiler::new(source);
        let outcome = engine
            .build(&compiler, &cancel)
            .context("Incremental build failed")?;
        PlanResponse::from_plan(&outcome.plan, true)
    } else {
        let plan = engine.plan(&cancel).context("Planning failed")?;
        PlanResponse::from_plan(&plan, false)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_plan(&response);
    }
    Ok(())
}

fn print_plan(response: &PlanResponse) {
    if response.units.is_empty() {
        println!("Nothing to recompile.");
    } else {
        println!(
            "Recompile {} unit(s) ({} round(s)):",
            response.units.len(),
            response.rounds
        );
        for unit in &response.units {
            println!("  [{}] {}  ({:?})", unit.round, unit.path, unit.reason);
        }
    }
    if !response.package_infos.is_empty() {
        println!("package-info units: {}", response.package_infos.join(", "));
    }
    if response.module_info {
        println!("module-info included");
    }
    if !response.removed_classes.is_empty() {
        println!("Removed classes:");
        for class in &response.removed_classes {
            println!("  {class}");
        }
    }
    for hazard in &response.visibility_hazards {
        println!(
            "Visibility hazard: {} ({}) reads from no-longer-required module {}",
            hazard.consumer, hazard.unit, hazard.lost_module
        );
    }
    for failure in &response.analysis_failures {
        println!("Analysis failed: {}: {}", failure.unit, failure.message);
    }
    for inconsistency in &response.inconsistencies {
        println!(
            "Inconsistent baseline edge: {} -[{}]-> {}",
            inconsistency.consumer, inconsistency.edge, inconsistency.missing
        );
    }
    if response.committed {
        println!("Build committed.");
    }
}

/// Print a summary of a stored baseline.
pub fn run_inspect(baseline: &Path, json: bool) -> Result<()> {
    let store = JsonBaselineStore::new(baseline);
    let summary = store
        .load()?
        .map(|b| BaselineSummary::from_baseline(&b))
        .with_context(|| format!("No baseline at {}", baseline.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("Baseline v{}", summary.version);
    println!("  Units:   {}", summary.unit_count);
    println!("  Classes: {}", summary.class_count);
    for (kind, count) in &summary.classes_by_kind {
        println!("    {kind:<16} {count}");
    }
    println!("  Edges:");
    for (kind, count) in &summary.edges_by_kind {
        println!("    {kind:<20} {count}");
    }
    if !summary.inconsistencies.is_empty() {
        println!("  Inconsistent edges: {}", summary.inconsistencies.len());
    }
    Ok(())
}
