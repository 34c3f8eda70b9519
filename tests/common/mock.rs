//! Mock port implementations and a build harness for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Result, anyhow};
use jvm_recompile::adapters::compiler::dry_run::DryRunCompiler;
use jvm_recompile::adapters::diagnostics::recording::RecordingSink;
use jvm_recompile::app::config::EngineConfig;
use jvm_recompile::app::engine::{BuildOutcome, IncrementalEngine};
use jvm_recompile::domain::analysis::UnitPath;
use jvm_recompile::domain::baseline::{Baseline, Snapshot};
use jvm_recompile::domain::descriptor::UnitDescriptor;
use jvm_recompile::domain::error::BuildError;
use jvm_recompile::domain::plan::RecompilationPlan;
use jvm_recompile::domain::ports::{
    BaselineStore, CancellationToken, CompileOutcome, CompilerDiagnostic, CompilerInvocation,
    DiagnosticKind, UnitSource,
};

/// Mutable in-memory unit source.
#[derive(Debug, Default)]
pub struct MockUnitSource {
    units: RwLock<BTreeMap<UnitPath, UnitDescriptor>>,
}

impl MockUnitSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(self, unit: UnitDescriptor) -> Self {
        self.put(unit);
        self
    }

    pub fn put(&self, unit: UnitDescriptor) {
        if let Ok(mut units) = self.units.write() {
            units.insert(unit.path.clone(), unit);
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut units) = self.units.write() {
            units.remove(path);
        }
    }

    pub fn get(&self, path: &str) -> Option<UnitDescriptor> {
        self.units.read().ok()?.get(path).cloned()
    }
}

impl UnitSource for MockUnitSource {
    fn snapshot(&self) -> Result<Snapshot> {
        let units = self.units.read().map_err(|_| anyhow!("poisoned"))?;
        Ok(units
            .values()
            .map(|u| (u.path.clone(), u.content_hash.clone()))
            .collect())
    }

    fn describe(&self, unit: &str) -> Result<UnitDescriptor> {
        self.get(unit)
            .ok_or_else(|| anyhow!("Unit not found: {}", unit))
    }
}

/// Baseline store kept in memory; counts saves.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    baseline: Mutex<Option<Baseline>>,
    saves: Mutex<usize>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Baseline> {
        self.baseline.lock().ok()?.clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or(0)
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load(&self) -> Result<Option<Baseline>> {
        Ok(self.current())
    }

    fn save(&self, baseline: &Baseline) -> Result<()> {
        *self.baseline.lock().map_err(|_| anyhow!("poisoned"))? = Some(baseline.clone());
        *self.saves.lock().map_err(|_| anyhow!("poisoned"))? += 1;
        Ok(())
    }
}

/// Compiler that fails every invocation with a fixed diagnostic.
pub struct FailingCompiler {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl CompilerInvocation for FailingCompiler {
    fn compile(&self, units: &[UnitPath]) -> Result<CompileOutcome> {
        Ok(CompileOutcome {
            success: false,
            produced: BTreeMap::new(),
            diagnostics: vec![CompilerDiagnostic {
                unit: units.first().cloned().unwrap_or_default(),
                kind: self.kind,
                message: self.message.clone(),
            }],
        })
    }
}

/// Dry-run compilation, with fixed extra classes reported for some units.
pub struct ExtraOutputCompiler {
    pub inner: DryRunCompiler,
    pub extra: BTreeMap<UnitPath, Vec<String>>,
}

impl CompilerInvocation for ExtraOutputCompiler {
    fn compile(&self, units: &[UnitPath]) -> Result<CompileOutcome> {
        let mut outcome = self.inner.compile(units)?;
        for (unit, classes) in &self.extra {
            if let Some(produced) = outcome.produced.get_mut(unit) {
                produced.extend(classes.iter().cloned());
            }
        }
        Ok(outcome)
    }
}

/// A workspace, a baseline store and an engine wired together.
pub struct Harness {
    pub source: Arc<MockUnitSource>,
    pub store: Arc<MemoryBaselineStore>,
    pub sink: Arc<RecordingSink>,
    pub engine: IncrementalEngine,
}

impl Harness {
    pub fn new(units: Vec<UnitDescriptor>) -> Self {
        Self::with_config(units, EngineConfig::default())
    }

    pub fn with_config(units: Vec<UnitDescriptor>, config: EngineConfig) -> Self {
        let source = Arc::new(MockUnitSource::new());
        for unit in units {
            source.put(unit);
        }
        let store = Arc::new(MemoryBaselineStore::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = IncrementalEngine::new(
            config,
            source.clone(),
            store.clone(),
            sink.clone(),
        )
        .unwrap();
        Self {
            source,
            store,
            sink,
            engine,
        }
    }

    /// Full build of the initial workspace; returns the harness with a baseline in place.
    pub fn built(units: Vec<UnitDescriptor>) -> Self {
        let harness = Self::new(units);
        harness.build().unwrap();
        harness
    }

    pub fn compiler(&self) -> DryRunCompiler {
        DryRunCompiler::new(self.source.clone())
    }

    pub fn build(&self) -> Result<BuildOutcome, BuildError> {
        self.engine
            .build(&self.compiler(), &CancellationToken::new())
    }

    pub fn plan(&self) -> Result<RecompilationPlan, BuildError> {
        self.engine.plan(&CancellationToken::new())
    }

    pub fn edit(&self, unit: UnitDescriptor) {
        self.source.put(unit);
    }

    pub fn delete(&self, path: &str) {
        self.source.remove(path);
    }
}

/// Planned unit paths, sorted.
pub fn planned(plan: &RecompilationPlan) -> Vec<String> {
    let mut units = plan.unit_paths();
    units.sort();
    units
}
