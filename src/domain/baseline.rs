//! The state one successful build hands to the next.

use crate::domain::analysis::{BinaryName, ClassAnalysis, UnitPath};
use crate::domain::graph::{DependencyGraph, EdgeRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever the persisted shape of [`Baseline`] or [`ClassAnalysis`] changes.
pub const BASELINE_VERSION: u32 = 1;

/// `{unit → content hash}` of a source tree.
pub type Snapshot = BTreeMap<UnitPath, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub version: u32,
    pub units: Snapshot,
    pub classes: BTreeMap<BinaryName, ClassAnalysis>,
    pub edges: Vec<EdgeRecord>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::new()
    }
}

impl Baseline {
    pub fn new() -> Self {
        Self {
            version: BASELINE_VERSION,
            units: BTreeMap::new(),
            classes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Assemble a baseline, deriving the edge set from the analyses.
    pub fn from_analyses(units: Snapshot, classes: BTreeMap<BinaryName, ClassAnalysis>) -> Self {
        let edges = DependencyGraph::build(classes.values()).edge_records();
        Self {
            version: BASELINE_VERSION,
            units,
            classes,
            edges,
        }
    }

    /// Graph as persisted. Edges to classes without an analysis surface as inconsistencies.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::restore(self.classes.values(), &self.edges)
    }

    /// Classes each unit declared when the baseline was written.
    pub fn unit_classes(&self) -> BTreeMap<UnitPath, BTreeSet<BinaryName>> {
        let mut by_unit: BTreeMap<UnitPath, BTreeSet<BinaryName>> = BTreeMap::new();
        for analysis in self.classes.values() {
            by_unit
                .entry(analysis.source_unit.clone())
                .or_default()
                .insert(analysis.binary_name.clone());
        }
        by_unit
    }

    /// Units whose content differs from (or is missing in) the baseline, and units that are
    /// gone from the snapshot.
    pub fn diff(&self, snapshot: &Snapshot) -> SnapshotDiff {
        let edited = snapshot
            .iter()
            .filter(|(unit, hash)| self.units.get(*unit) != Some(*hash))
            .map(|(unit, _)| unit.clone())
            .collect();
        let deleted = self
            .units
            .keys()
            .chain(self.classes.values().map(|c| &c.source_unit))
            .filter(|unit| !snapshot.contains_key(*unit))
            .cloned()
            .collect();
        SnapshotDiff { edited, deleted }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub edited: BTreeSet<UnitPath>,
    pub deleted: BTreeSet<UnitPath>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.edited.is_empty() && self.deleted.is_empty()
    }
}
