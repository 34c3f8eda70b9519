//! Fixpoint propagation from directly edited units to every unit that must be recompiled.
//!
//! Scheduling is unit-granular: a compilation unit is the smallest thing the compiler accepts,
//! so scheduling one class schedules every class its unit declares. Each unit moves
//! `Pending → Scheduled → Settled` at most once per build.
//!
//! Rounds:
//! - round 0 seeds the edited units and takes the unconditional first hop;
//! - every following round analyzes the scheduled batch, classifies each touched class against
//!   its last known analysis, and schedules dependents according to the delta.
//!
//! A settled unit whose analysis folded a constant that changes in a later round is re-analyzed
//! ("refreshed") without being planned again, so the analyses persisted for the next build never
//! carry a stale folded value.

use crate::domain::analysis::{BinaryName, ClassAnalysis, ClassKind, ConstantRef, UnitPath};
use crate::domain::analyzer::{ClassAnalyzer, ConstantLookup};
use crate::domain::baseline::{Baseline, Snapshot, SnapshotDiff};
use crate::domain::classifier::{ChangeClassifier, Classification};
use crate::domain::descriptor::UnitDescriptor;
use crate::domain::edge::EdgeKind;
use crate::domain::error::{AnalysisError, BuildError, PropagationError};
use crate::domain::graph::DependencyGraph;
use crate::domain::plan::{
    AnalysisFailure, PlannedUnit, RecompilationPlan, ScheduleReason, VisibilityHazard,
};
use crate::domain::ports::{CancellationToken, DiagnosticsSink, UnitSource};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Lifecycle of a unit (and so of every class it declares) within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    Pending,
    Scheduled,
    Settled,
}

/// Collaborators and limits for one build.
pub struct PropagationContext<'a> {
    pub baseline: &'a Baseline,
    pub snapshot: &'a Snapshot,
    pub source: &'a dyn UnitSource,
    pub analyzer: &'a ClassAnalyzer,
    pub sink: &'a dyn DiagnosticsSink,
    pub cancel: CancellationToken,
    pub max_rounds: usize,
}

/// Current analyses first, then the baseline, hiding classes removed during this build.
struct BuildLookup<'a> {
    current: &'a BTreeMap<BinaryName, ClassAnalysis>,
    removed: &'a BTreeSet<BinaryName>,
    baseline: &'a BTreeMap<BinaryName, ClassAnalysis>,
}

impl ConstantLookup for BuildLookup<'_> {
    fn analysis(&self, binary_name: &str) -> Option<&ClassAnalysis> {
        self.current.get(binary_name).or_else(|| {
            if self.removed.contains(binary_name) {
                None
            } else {
                self.baseline.get(binary_name)
            }
        })
    }
}

enum UnitOutcome {
    Analyzed(Vec<ClassAnalysis>),
    Failed(AnalysisError),
    /// Unit no longer exists in the snapshot.
    Gone,
}

/// Impact Propagator - computes the recompilation closure of a set of edited units
pub struct ImpactPropagator<'a> {
    ctx: PropagationContext<'a>,
    graph: DependencyGraph,
    classifier: ChangeClassifier,
    prior_units: BTreeMap<UnitPath, BTreeSet<BinaryName>>,

    states: HashMap<UnitPath, ClassState>,
    queue: VecDeque<UnitPath>,
    refresh: BTreeSet<UnitPath>,
    planned: Vec<PlannedUnit>,
    round: usize,

    /// Analyses produced (or confirmed) during this build.
    current: BTreeMap<BinaryName, ClassAnalysis>,
    /// Units successfully analyzed this build and the classes they now declare.
    analyzed_units: BTreeMap<UnitPath, BTreeSet<BinaryName>>,
    removed: BTreeSet<BinaryName>,
    changed_constants: BTreeSet<ConstantRef>,
    failures: BTreeMap<UnitPath, AnalysisError>,
    hazards: BTreeSet<VisibilityHazard>,
}

impl<'a> ImpactPropagator<'a> {
    pub fn new(ctx: PropagationContext<'a>) -> Self {
        let graph = ctx.baseline.graph();
        let prior_units = ctx.baseline.unit_classes();
        Self {
            ctx,
            graph,
            classifier: ChangeClassifier::new(),
            prior_units,
            states: HashMap::new(),
            queue: VecDeque::new(),
            refresh: BTreeSet::new(),
            planned: Vec::new(),
            round: 0,
            current: BTreeMap::new(),
            analyzed_units: BTreeMap::new(),
            removed: BTreeSet::new(),
            changed_constants: BTreeSet::new(),
            failures: BTreeMap::new(),
            hazards: BTreeSet::new(),
        }
    }

    pub fn state(&self, unit: &str) -> ClassState {
        self.states.get(unit).copied().unwrap_or(ClassState::Pending)
    }

    /// Seed with the snapshot delta and run to a fixpoint.
    pub fn propagate(&mut self, diff: &SnapshotDiff) -> Result<RecompilationPlan, BuildError> {
        self.seed(diff);
        self.run()?;
        let plan = self.plan();
        info!(
            units = plan.len(),
            rounds = plan.rounds,
            removed = plan.removed_classes.len(),
            failures = plan.analysis_failures.len(),
            "recompilation plan ready"
        );
        self.ctx.sink.plan_ready(&plan);
        Ok(plan)
    }

    /// Feed back what the compiler actually wrote. Classes produced but never analyzed count as
    /// Added; analyzed classes the compiler did not produce count as Removed. Returns units newly
    /// planned as a consequence.
    pub fn reconcile(
        &mut self,
        produced: &BTreeMap<UnitPath, Vec<BinaryName>>,
    ) -> Result<Vec<UnitPath>, BuildError> {
        let before = self.planned.len();
        for (unit, names) in produced {
            let produced: BTreeSet<&BinaryName> = names.iter().collect();
            let analyzed = self.classes_of(unit);

            for name in produced.iter().filter(|n| !analyzed.contains(**n)) {
                warn!(unit = %unit, class = %name, "compiler produced a class the analyzer did not see");
                let classification = self.classifier.classify_and_report(
                    name,
                    None,
                    Some(&placeholder(name, unit)),
                    self.ctx.sink,
                );
                self.react(&classification, None, &BTreeSet::new());
            }

            for name in analyzed.iter().filter(|n| !produced.contains(n)) {
                let Some(previous) = self.lookup(name).cloned() else {
                    continue;
                };
                // Pseudo-classes without retained annotations legitimately produce nothing.
                if previous.is_pseudo() {
                    continue;
                }
                warn!(unit = %unit, class = %name, "analyzed class was not produced by the compiler");
                let classification = self.classifier.classify_and_report(
                    name,
                    Some(&previous),
                    None,
                    self.ctx.sink,
                );
                self.current.remove(name);
                self.removed.insert(name.clone());
                if let Some(classes) = self.analyzed_units.get_mut(unit) {
                    classes.remove(name);
                }
                self.react(&classification, Some(&previous), &BTreeSet::new());
            }
        }
        self.run()?;
        Ok(self.planned[before..]
            .iter()
            .map(|u| u.path.clone())
            .collect())
    }

    // ============ Seeding ============

    fn seed(&mut self, diff: &SnapshotDiff) {
        let seeds: BTreeSet<&UnitPath> = diff.edited.iter().chain(&diff.deleted).collect();
        for unit in &seeds {
            self.schedule(unit, ScheduleReason::Edited);
        }

        // First hop: unconditional, whatever the edit turns out to be.
        for unit in &seeds {
            let Some(classes) = self.prior_units.get(*unit).cloned() else {
                continue;
            };
            for class in classes {
                for (dependent, kind) in self.graph.dependency_edges(&class) {
                    self.schedule_class(
                        &dependent,
                        ScheduleReason::DependsOnEdited {
                            class: class.clone(),
                            edge: kind.label().to_string(),
                        },
                    );
                }
            }
        }

        // A persisted edge to a class nobody declares: the target is treated as Removed.
        for inconsistency in self.graph.inconsistencies().to_vec() {
            warn!(
                consumer = %inconsistency.consumer,
                missing = %inconsistency.missing,
                edge = %inconsistency.edge,
                "baseline edge points at a class with no analysis"
            );
            self.schedule_class(
                &inconsistency.consumer,
                ScheduleReason::MissingDependency {
                    class: inconsistency.missing.clone(),
                },
            );
        }
    }

    fn schedule(&mut self, unit: &str, reason: ScheduleReason) {
        let state = self
            .states
            .entry(unit.to_string())
            .or_insert(ClassState::Pending);
        if *state != ClassState::Pending {
            return;
        }
        *state = ClassState::Scheduled;
        self.queue.push_back(unit.to_string());

        // Deleted units are processed but never handed to the compiler.
        if self.ctx.snapshot.contains_key(unit) {
            debug!(unit, round = self.round, ?reason, "scheduled");
            self.ctx.sink.scheduled(unit, self.round, &reason);
            self.planned.push(PlannedUnit {
                path: unit.to_string(),
                round: self.round,
                reason,
            });
        }
    }

    fn schedule_class(&mut self, class: &str, reason: ScheduleReason) {
        if let Some(unit) = self.unit_of(class) {
            self.schedule(&unit, reason);
        }
    }

    // ============ Fixpoint ============

    fn run(&mut self) -> Result<(), BuildError> {
        while !self.queue.is_empty() || !self.refresh.is_empty() {
            if self.ctx.cancel.is_cancelled() {
                return Err(PropagationError::Cancelled {
                    round: self.round + 1,
                }
                .into());
            }
            if self.round >= self.ctx.max_rounds {
                return Err(PropagationError::NonTermination {
                    rounds: self.ctx.max_rounds,
                }
                .into());
            }
            self.round += 1;

            let batch: Vec<UnitPath> = self.queue.drain(..).collect();
            let refresh: Vec<UnitPath> = std::mem::take(&mut self.refresh)
                .into_iter()
                .filter(|unit| !batch.contains(unit))
                .collect();
            info!(
                round = self.round,
                scheduled = batch.len(),
                refreshed = refresh.len(),
                "propagation round"
            );
            for unit in &batch {
                self.states.insert(unit.clone(), ClassState::Settled);
            }
            self.settle(&batch, &refresh)?;
        }
        Ok(())
    }

    fn settle(&mut self, batch: &[UnitPath], refresh: &[UnitPath]) -> Result<(), BuildError> {
        let mut outcomes: BTreeMap<UnitPath, UnitOutcome> = BTreeMap::new();
        let mut fresh: BTreeSet<UnitPath> = BTreeSet::new();
        let mut reusable: Vec<UnitPath> = Vec::new();

        for unit in batch.iter().chain(refresh) {
            let refreshing = !batch.contains(unit);
            match self.ctx.snapshot.get(unit) {
                None => {
                    outcomes.insert(unit.clone(), UnitOutcome::Gone);
                }
                Some(hash) if !refreshing && self.can_reuse(unit, hash) => {
                    reusable.push(unit.clone());
                }
                Some(_) => {
                    fresh.insert(unit.clone());
                }
            }
        }

        // Inlining a constant from a unit analyzed in this round rules out reuse, transitively.
        loop {
            let (stale, keep): (Vec<UnitPath>, Vec<UnitPath>) = reusable
                .into_iter()
                .partition(|unit| self.inlines_from(unit, &fresh));
            reusable = keep;
            if stale.is_empty() {
                break;
            }
            fresh.extend(stale);
        }

        for unit in reusable {
            debug!(unit = %unit, "content and inlined constants unchanged, reusing analysis");
            let reused = self
                .prior_units
                .get(&unit)
                .into_iter()
                .flatten()
                .filter_map(|name| self.ctx.baseline.classes.get(name))
                .cloned()
                .collect();
            outcomes.insert(unit, UnitOutcome::Analyzed(reused));
        }

        let mut descriptors: Vec<UnitDescriptor> = Vec::with_capacity(fresh.len());
        for unit in &fresh {
            let descriptor = self
                .ctx
                .source
                .describe(unit)
                .map_err(|source| BuildError::Source {
                    unit: unit.clone(),
                    source,
                })?;
            descriptors.push(descriptor);
        }

        let lookup = BuildLookup {
            current: &self.current,
            removed: &self.removed,
            baseline: &self.ctx.baseline.classes,
        };
        for result in self.ctx.analyzer.analyze_batch(&descriptors, &lookup) {
            let outcome = match result.result {
                Ok(analyses) => UnitOutcome::Analyzed(analyses),
                Err(error) => UnitOutcome::Failed(error),
            };
            outcomes.insert(result.unit, outcome);
        }

        // Names declared by the batch before and after, and the new analyses by name.
        let in_batch: BTreeSet<UnitPath> = outcomes.keys().cloned().collect();
        let mut touched: BTreeSet<BinaryName> = BTreeSet::new();
        let mut staged: BTreeMap<BinaryName, ClassAnalysis> = BTreeMap::new();
        let mut failed: Vec<(UnitPath, AnalysisError)> = Vec::new();

        for (unit, outcome) in outcomes {
            let previous = self.classes_of(&unit);
            match outcome {
                UnitOutcome::Gone => {
                    touched.extend(previous);
                    self.analyzed_units.insert(unit, BTreeSet::new());
                }
                UnitOutcome::Analyzed(analyses) => {
                    touched.extend(previous);
                    let names: BTreeSet<BinaryName> =
                        analyses.iter().map(|a| a.binary_name.clone()).collect();
                    touched.extend(names.iter().cloned());
                    self.analyzed_units.insert(unit, names);
                    staged.extend(analyses.into_iter().map(|a| (a.binary_name.clone(), a)));
                }
                UnitOutcome::Failed(error) => failed.push((unit, error)),
            }
        }

        for name in touched {
            let next = match staged.remove(&name) {
                Some(analysis) => Some(analysis),
                // Moved to a unit settled in an earlier round.
                None => match self.current.get(&name) {
                    Some(existing) if !in_batch.contains(&existing.source_unit) => continue,
                    _ => None,
                },
            };
            let previous = if self.removed.contains(&name) {
                None
            } else {
                self.lookup(&name).cloned()
            };
            if previous.is_none() && next.is_none() {
                continue;
            }

            let classification = self.classifier.classify_and_report(
                &name,
                previous.as_ref(),
                next.as_ref(),
                self.ctx.sink,
            );
            debug!(class = %name, changes = ?classification.changes, "classified");

            match next {
                Some(analysis) => {
                    self.removed.remove(&name);
                    self.current.insert(name.clone(), analysis);
                }
                None => {
                    self.current.remove(&name);
                    self.removed.insert(name.clone());
                }
            }
            self.react(&classification, previous.as_ref(), &fresh);
        }

        for (unit, error) in failed {
            self.fail(&unit, error, &fresh);
        }

        for unit in batch {
            self.expand_pseudo_units(unit);
        }
        Ok(())
    }

    /// Same content as the baseline, and nothing it inlined changed value this build.
    fn can_reuse(&self, unit: &str, hash: &str) -> bool {
        if self.ctx.baseline.units.get(unit).map(String::as_str) != Some(hash) {
            return false;
        }
        let Some(classes) = self.prior_units.get(unit) else {
            return false;
        };
        classes.iter().all(|name| {
            self.ctx.baseline.classes.get(name).is_some_and(|analysis| {
                analysis.used_constants.iter().all(|used| {
                    !self.changed_constants.contains(used) && !self.removed.contains(&used.owner)
                })
            })
        })
    }

    /// Whether a unit's prior analyses inline a constant owned by one of `fresh`.
    fn inlines_from(&self, unit: &str, fresh: &BTreeSet<UnitPath>) -> bool {
        self.prior_units
            .get(unit)
            .into_iter()
            .flatten()
            .filter_map(|name| self.ctx.baseline.classes.get(name))
            .flat_map(|analysis| &analysis.used_constants)
            .filter_map(|used| self.unit_of(&used.owner))
            .any(|owner| fresh.contains(&owner))
    }

    // ============ Reactions ============

    fn react(
        &mut self,
        classification: &Classification,
        previous: Option<&ClassAnalysis>,
        fresh: &BTreeSet<UnitPath>,
    ) {
        let name = classification.binary_name.as_str();

        if classification.is_added() {
            for consumer in self.graph.dangling_consumers(name) {
                self.schedule_class(
                    &consumer,
                    ScheduleReason::DependencyAdded {
                        class: name.to_string(),
                    },
                );
            }
            self.refresh_where(fresh, |a| references(a, name));
        }

        if classification.is_removed() {
            for (dependent, _) in self.graph.dependency_edges(name) {
                self.schedule_class(
                    &dependent,
                    ScheduleReason::DependencyRemoved {
                        class: name.to_string(),
                    },
                );
            }
            if let Some(previous) = previous {
                for constant in previous.declared_constants.keys() {
                    self.constant_changed(ConstantRef::new(name, constant), fresh);
                }
            }
        }

        if classification.abi_changed() {
            for dependent in self.graph.dependents(name, EdgeKind::is_abi_sensitive) {
                self.schedule_class(
                    &dependent,
                    ScheduleReason::AbiChanged {
                        class: name.to_string(),
                    },
                );
            }
        }

        for constant in classification.changed_constants() {
            self.constant_changed(ConstantRef::new(name, constant), fresh);
        }

        if !classification.lost_requires.is_empty() {
            self.check_visibility(name, &classification.lost_requires);
        }
    }

    fn constant_changed(&mut self, constant: ConstantRef, fresh: &BTreeSet<UnitPath>) {
        for consumer in self
            .graph
            .constant_consumers(&constant.owner, &constant.name)
        {
            self.schedule_class(
                &consumer,
                ScheduleReason::ConstantChanged {
                    constant: constant.clone(),
                },
            );
        }
        self.refresh_where(fresh, |a| a.used_constants.contains(&constant));
        self.changed_constants.insert(constant);
    }

    /// Queue settled units whose current analysis matches `predicate` for re-analysis. Units
    /// analyzed in the running round already folded against the round's own sources.
    fn refresh_where(
        &mut self,
        fresh: &BTreeSet<UnitPath>,
        predicate: impl Fn(&ClassAnalysis) -> bool,
    ) {
        let units: BTreeSet<UnitPath> = self
            .current
            .values()
            .filter(|a| predicate(a))
            .map(|a| a.source_unit.clone())
            .filter(|unit| !fresh.contains(unit))
            .filter(|unit| self.state(unit) == ClassState::Settled)
            .collect();
        for unit in units {
            debug!(unit = %unit, "refreshing analysis after upstream constant change");
            self.refresh.insert(unit);
        }
    }

    /// The unit's prior analyses stay in place; every class they declared counts as changed.
    fn fail(&mut self, unit: &str, error: AnalysisError, fresh: &BTreeSet<UnitPath>) {
        warn!(unit, %error, "analysis failed, recompiling every prior dependent");
        self.ctx.sink.analysis_failed(&error);

        for name in self.classes_of(unit) {
            for (dependent, _) in self.graph.dependency_edges(&name) {
                self.schedule_class(
                    &dependent,
                    ScheduleReason::AnalysisFailed {
                        unit: unit.to_string(),
                    },
                );
            }
            let constants: Vec<String> = self
                .lookup(&name)
                .map(|a| a.declared_constants.keys().cloned().collect())
                .unwrap_or_default();
            for constant in constants {
                self.constant_changed(ConstantRef::new(&name, &constant), fresh);
            }
        }
        self.failures.insert(unit.to_string(), error);
    }

    /// A scheduled package-info / module-info pulls in every class of its package / module, plus
    /// one hop of their type-reference and inheritance dependents.
    fn expand_pseudo_units(&mut self, unit: &str) {
        let mut pseudo: Vec<ClassAnalysis> = self
            .prior_units
            .get(unit)
            .into_iter()
            .flatten()
            .filter_map(|name| self.ctx.baseline.classes.get(name))
            .chain(
                self.analyzed_units
                    .get(unit)
                    .into_iter()
                    .flatten()
                    .filter_map(|name| self.current.get(name)),
            )
            .filter(|a| a.is_pseudo())
            .cloned()
            .collect();
        pseudo.dedup_by(|a, b| a.binary_name == b.binary_name);

        for analysis in pseudo {
            let (members, reason) = match analysis.kind {
                ClassKind::PackageInfo => {
                    let package = analysis.package_name.clone();
                    let mut members = self.graph.package_members(&package);
                    members.extend(
                        self.current
                            .values()
                            .filter(|a| a.package_name == package)
                            .map(|a| a.binary_name.clone()),
                    );
                    (members, ScheduleReason::PackageInfo { package })
                }
                ClassKind::ModuleInfo => {
                    let Some(module) = analysis.module_name.clone() else {
                        continue;
                    };
                    let mut members = self.graph.module_members(&module);
                    members.extend(
                        self.current
                            .values()
                            .filter(|a| a.module_name.as_deref() == Some(module.as_str()))
                            .map(|a| a.binary_name.clone()),
                    );
                    (members, ScheduleReason::ModuleInfo { module })
                }
                ClassKind::Class
                | ClassKind::Interface
                | ClassKind::Record
                | ClassKind::AnnotationType => continue,
            };

            for member in &members {
                self.schedule_class(member, reason.clone());
            }
            for member in members {
                let dependents = self.graph.dependents(&member, |kind| {
                    matches!(kind, EdgeKind::TypeReference | EdgeKind::Inheritance)
                });
                for dependent in dependents {
                    self.schedule_class(
                        &dependent,
                        ScheduleReason::PseudoNodeHop {
                            member: member.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Classes of the module that read from a module it no longer requires.
    fn check_visibility(&mut self, module_info: &str, lost: &[String]) {
        let Some(module) = self.lookup(module_info).and_then(|a| a.module_name.clone()) else {
            return;
        };
        let mut members = self.graph.module_members(&module);
        members.extend(
            self.current
                .values()
                .filter(|a| a.module_name.as_deref() == Some(module.as_str()))
                .map(|a| a.binary_name.clone()),
        );

        let mut found = Vec::new();
        for member in &members {
            let Some(consumer) = self.lookup(member) else {
                continue;
            };
            let referenced = consumer
                .type_references
                .iter()
                .chain(&consumer.supertypes)
                .chain(consumer.annotation_types_used.keys())
                .chain(consumer.used_constants.iter().map(|c| &c.owner));
            for target in referenced {
                let Some(target_module) = self.lookup(target).and_then(|a| a.module_name.as_ref())
                else {
                    continue;
                };
                if let Some(lost_module) = lost.iter().find(|m| *m == target_module) {
                    found.push(VisibilityHazard {
                        consumer: member.clone(),
                        unit: consumer.source_unit.clone(),
                        lost_module: lost_module.clone(),
                    });
                }
            }
        }

        for hazard in found {
            warn!(
                consumer = %hazard.consumer,
                module = %hazard.lost_module,
                "module no longer requires a module this class reads from"
            );
            self.schedule(
                &hazard.unit,
                ScheduleReason::VisibilityHazard {
                    module: hazard.lost_module.clone(),
                },
            );
            self.hazards.insert(hazard);
        }
    }

    // ============ Views ============

    /// Same resolution order as [`BuildLookup`], borrowing from `self`.
    fn lookup(&self, name: &str) -> Option<&ClassAnalysis> {
        self.current.get(name).or_else(|| {
            if self.removed.contains(name) {
                None
            } else {
                self.ctx.baseline.classes.get(name)
            }
        })
    }

    fn unit_of(&self, class: &str) -> Option<UnitPath> {
        self.current
            .get(class)
            .or_else(|| self.ctx.baseline.classes.get(class))
            .map(|a| a.source_unit.clone())
    }

    /// Classes a unit declares as far as this build knows.
    fn classes_of(&self, unit: &str) -> BTreeSet<BinaryName> {
        self.analyzed_units
            .get(unit)
            .or_else(|| self.prior_units.get(unit))
            .cloned()
            .unwrap_or_default()
    }

    /// Every analysis that should be persisted if the build succeeds.
    pub fn analyses(&self) -> BTreeMap<BinaryName, ClassAnalysis> {
        let mut classes: BTreeMap<BinaryName, ClassAnalysis> = self
            .ctx
            .baseline
            .classes
            .iter()
            .filter(|(name, analysis)| {
                !self.removed.contains(*name)
                    && !self.analyzed_units.contains_key(&analysis.source_unit)
            })
            .map(|(name, analysis)| (name.clone(), analysis.clone()))
            .collect();
        classes.extend(
            self.current
                .iter()
                .map(|(name, analysis)| (name.clone(), analysis.clone())),
        );
        classes
    }

    pub fn plan(&self) -> RecompilationPlan {
        let classes = self.analyses();

        let mut units = self.planned.clone();
        units.sort_by(|a, b| a.round.cmp(&b.round).then_with(|| a.path.cmp(&b.path)));

        let mut package_infos = Vec::new();
        let mut module_infos = Vec::new();
        for unit in &units {
            let kinds: BTreeSet<ClassKind> = self
                .classes_of(&unit.path)
                .iter()
                .chain(self.prior_units.get(&unit.path).into_iter().flatten())
                .filter_map(|name| classes.get(name))
                .map(|a| a.kind)
                .collect();
            if kinds.contains(&ClassKind::PackageInfo) {
                package_infos.push(unit.path.clone());
            }
            if kinds.contains(&ClassKind::ModuleInfo) {
                module_infos.push(unit.path.clone());
            }
        }

        // Failed units keep their prior analyses but lose their hash, so the next build
        // analyzes them again.
        let hashes: Snapshot = self
            .ctx
            .snapshot
            .iter()
            .filter(|(unit, _)| !self.failures.contains_key(*unit))
            .map(|(unit, hash)| (unit.clone(), hash.clone()))
            .collect();

        RecompilationPlan {
            units,
            package_infos,
            module_infos,
            removed_classes: self.removed.clone(),
            visibility_hazards: self.hazards.iter().cloned().collect(),
            analysis_failures: self
                .failures
                .iter()
                .map(|(unit, error)| AnalysisFailure {
                    unit: unit.clone(),
                    message: error.to_string(),
                })
                .collect(),
            inconsistencies: self.graph.inconsistencies().to_vec(),
            rounds: self.round,
            next_baseline: Baseline::from_analyses(hashes, classes),
        }
    }
}

/// Whether `analysis` names `target` anywhere it could resolve to a class.
fn references(analysis: &ClassAnalysis, target: &str) -> bool {
    analysis.type_references.contains(target)
        || analysis.supertypes.iter().any(|s| s == target)
        || analysis.annotation_types_used.contains_key(target)
        || analysis.used_constants.iter().any(|c| c.owner == target)
}

/// Stand-in for a class the compiler produced but the analyzer never described.
fn placeholder(name: &str, unit: &str) -> ClassAnalysis {
    ClassAnalysis {
        binary_name: name.to_string(),
        source_unit: unit.to_string(),
        kind: ClassKind::Class,
        supertypes: Vec::new(),
        public_surface_hash: String::new(),
        declared_constants: BTreeMap::new(),
        used_constants: BTreeSet::new(),
        annotation_constants: BTreeSet::new(),
        annotation_types_used: BTreeMap::new(),
        type_references: BTreeSet::new(),
        package_name: crate::domain::analysis::package_of(name).to_string(),
        module_name: None,
        outer_class: None,
        module_directives: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::json::JsonUnitSource;
    use crate::domain::descriptor::TypeDescriptor;

    struct Quiet;

    impl DiagnosticsSink for Quiet {}

    fn unit(name: &str, hash: &str, supertype: Option<&str>) -> UnitDescriptor {
        let mut descriptor = TypeDescriptor::new(name, ClassKind::Class);
        descriptor.supertypes.extend(supertype.map(str::to_string));
        UnitDescriptor {
            path: format!("{}.java", name.replace('.', "/")),
            content_hash: hash.to_string(),
            package: "p".to_string(),
            module: None,
            parse_error: None,
            types: vec![descriptor],
        }
    }

    fn run(
        baseline: &Baseline,
        source: &JsonUnitSource,
        check: impl FnOnce(&ImpactPropagator<'_>),
    ) -> RecompilationPlan {
        let snapshot = source.snapshot().unwrap();
        let analyzer = ClassAnalyzer::new();
        let mut propagator = ImpactPropagator::new(PropagationContext {
            baseline,
            snapshot: &snapshot,
            source,
            analyzer: &analyzer,
            sink: &Quiet,
            cancel: CancellationToken::new(),
            max_rounds: 100,
        });
        let plan = propagator.propagate(&baseline.diff(&snapshot)).unwrap();
        check(&propagator);
        plan
    }

    #[test]
    fn test_unit_states_after_propagation() {
        let initial = JsonUnitSource::new(vec![
            unit("p.A", "1", None),
            unit("p.B", "1", Some("p.A")),
            unit("p.C", "1", None),
        ]);
        let first = run(&Baseline::new(), &initial, |propagator| {
            assert_eq!(propagator.state("p/C.java"), ClassState::Settled);
        });
        assert_eq!(first.len(), 3);

        let edited = JsonUnitSource::new(vec![
            unit("p.A", "2", None),
            unit("p.B", "1", Some("p.A")),
            unit("p.C", "1", None),
        ]);
        let second = run(&first.next_baseline, &edited, |propagator| {
            assert_eq!(propagator.state("p/A.java"), ClassState::Settled);
            assert_eq!(propagator.state("p/B.java"), ClassState::Settled);
            assert_eq!(propagator.state("p/C.java"), ClassState::Pending);
        });
        assert_eq!(second.unit_paths(), vec!["p/A.java", "p/B.java"]);
    }

    #[test]
    fn test_no_edit_leaves_every_unit_pending() {
        let source = JsonUnitSource::new(vec![unit("p.A", "1", None)]);
        let first = run(&Baseline::new(), &source, |_| {});
        let second = run(&first.next_baseline, &source, |propagator| {
            assert_eq!(propagator.state("p/A.java"), ClassState::Pending);
        });
        assert!(second.is_empty());
        assert_eq!(second.rounds, 0);
    }
}
