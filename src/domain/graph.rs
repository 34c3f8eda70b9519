use crate::domain::analysis::{BinaryName, ClassAnalysis};
use crate::domain::edge::EdgeKind;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Graph node: a concrete class (including package-info / module-info pseudo-classes) or a
/// package / module pseudo-node that classes are members of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "node", content = "name", rename_all = "snake_case")]
pub enum GraphNode {
    Class(BinaryName),
    Package(String),
    Module(String),
}

/// Persistable form of one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: BinaryName,
    pub to: GraphNode,
    #[serde(flatten)]
    pub kind: EdgeKind,
}

/// A persisted edge whose endpoint has no analysis in the current universe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphInconsistency {
    pub consumer: BinaryName,
    pub missing: BinaryName,
    pub edge: String,
}

/// Dependency Graph - classes and pseudo-nodes connected by typed consumer → dependency edges
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub graph: DiGraph<GraphNode, EdgeKind>,
    class_to_node: HashMap<BinaryName, NodeIndex>,
    package_to_node: HashMap<String, NodeIndex>,
    module_to_node: HashMap<String, NodeIndex>,
    /// Referenced name → consumers, for references that resolve to no known class
    /// (JDK types, classes that do not exist yet).
    dangling: BTreeMap<BinaryName, BTreeSet<BinaryName>>,
    inconsistencies: Vec<GraphInconsistency>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-pass build: allocate every node first, then wire edges so that edge direction never
    /// depends on iteration order.
    pub fn build<'a>(analyses: impl IntoIterator<Item = &'a ClassAnalysis>) -> Self {
        let analyses: Vec<&ClassAnalysis> = analyses.into_iter().collect();
        let mut graph = Self::new();

        // Pass 1: nodes
        for analysis in &analyses {
            graph.add_class(analysis);
        }

        // Pass 2: edges
        for analysis in &analyses {
            graph.wire(analysis);
        }

        graph
    }

    /// Rebuild from persisted analyses and edge set. Edges whose consumer or target has no
    /// analysis are kept aside as inconsistencies instead of failing the load.
    pub fn restore<'a>(
        analyses: impl IntoIterator<Item = &'a ClassAnalysis>,
        edges: &[EdgeRecord],
    ) -> Self {
        let analyses: Vec<&ClassAnalysis> = analyses.into_iter().collect();
        let mut graph = Self::new();
        for analysis in &analyses {
            graph.add_class(analysis);
        }

        for record in edges {
            let Some(source) = graph.class_to_node.get(&record.from).copied() else {
                // A consumer that no longer exists cannot be recompiled; the edge is stale.
                continue;
            };
            let target = match &record.to {
                GraphNode::Class(name) => graph.class_to_node.get(name).copied(),
                GraphNode::Package(name) => Some(graph.package_node(name)),
                GraphNode::Module(name) => Some(graph.module_node(name)),
            };
            match target {
                Some(target) => graph.add_edge(source, target, record.kind.clone()),
                None => {
                    if let GraphNode::Class(missing) = &record.to {
                        graph.inconsistencies.push(GraphInconsistency {
                            consumer: record.from.clone(),
                            missing: missing.clone(),
                            edge: record.kind.label().to_string(),
                        });
                    }
                }
            }
        }

        // Dangling references are derivable from the analyses themselves.
        for analysis in &analyses {
            for referenced in analysis
                .type_references
                .iter()
                .chain(analysis.supertypes.iter())
                .chain(analysis.annotation_types_used.keys())
            {
                if !graph.class_to_node.contains_key(referenced) {
                    graph
                        .dangling
                        .entry(referenced.clone())
                        .or_default()
                        .insert(analysis.binary_name.clone());
                }
            }
        }

        graph.inconsistencies.sort();
        graph.inconsistencies.dedup();
        graph
    }

    fn add_class(&mut self, analysis: &ClassAnalysis) -> NodeIndex {
        if let Some(&idx) = self.class_to_node.get(&analysis.binary_name) {
            return idx;
        }
        let idx = self
            .graph
            .add_node(GraphNode::Class(analysis.binary_name.clone()));
        self.class_to_node
            .insert(analysis.binary_name.clone(), idx);
        idx
    }

    fn package_node(&mut self, package: &str) -> NodeIndex {
        if let Some(&idx) = self.package_to_node.get(package) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Package(package.to_string()));
        self.package_to_node.insert(package.to_string(), idx);
        idx
    }

    fn module_node(&mut self, module: &str) -> NodeIndex {
        if let Some(&idx) = self.module_to_node.get(module) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Module(module.to_string()));
        self.module_to_node.insert(module.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, kind: EdgeKind) {
        let exists = self
            .graph
            .edges(source)
            .any(|e| e.target() == target && *e.weight() == kind);
        if !exists {
            self.graph.add_edge(source, target, kind);
        }
    }

    fn wire(&mut self, analysis: &ClassAnalysis) {
        let consumer = self.class_to_node[&analysis.binary_name];

        let package = self.package_node(&analysis.package_name);
        self.add_edge(consumer, package, EdgeKind::PackageMembership);
        if let Some(module) = &analysis.module_name {
            let module = self.module_node(module);
            self.add_edge(consumer, module, EdgeKind::ModuleMembership);
        }

        for supertype in &analysis.supertypes {
            self.wire_class_edge(analysis, supertype, EdgeKind::Inheritance);
        }
        for referenced in &analysis.type_references {
            self.wire_class_edge(analysis, referenced, EdgeKind::TypeReference);
        }
        for used in &analysis.used_constants {
            self.wire_class_edge(
                analysis,
                &used.owner,
                EdgeKind::ConstantUsage {
                    constant: used.name.clone(),
                },
            );
        }
        for annotation in analysis.annotation_types_used.keys() {
            self.wire_class_edge(analysis, annotation, EdgeKind::AnnotationUsage);
        }
        for folded in &analysis.annotation_constants {
            self.wire_class_edge(analysis, &folded.owner, EdgeKind::AnnotationUsage);
        }
    }

    fn wire_class_edge(&mut self, analysis: &ClassAnalysis, target: &str, kind: EdgeKind) {
        if target == analysis.binary_name {
            return;
        }
        let consumer = self.class_to_node[&analysis.binary_name];
        match self.class_to_node.get(target).copied() {
            Some(target) => self.add_edge(consumer, target, kind),
            None => {
                self.dangling
                    .entry(target.to_string())
                    .or_default()
                    .insert(analysis.binary_name.clone());
            }
        }
    }

    pub fn get_node_by_name(&self, binary_name: &str) -> Option<NodeIndex> {
        self.class_to_node.get(binary_name).copied()
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.class_to_node.contains_key(binary_name)
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn class_count(&self) -> usize {
        self.class_to_node.len()
    }

    /// Consumers holding an edge accepted by `filter` towards `binary_name`.
    pub fn dependents(
        &self,
        binary_name: &str,
        filter: impl Fn(&EdgeKind) -> bool,
    ) -> BTreeSet<BinaryName> {
        let Some(idx) = self.get_node_by_name(binary_name) else {
            return BTreeSet::new();
        };
        self.incoming_classes(idx, filter)
    }

    /// Incoming class → class dependency edges of `binary_name`, with their kind.
    pub fn dependency_edges(&self, binary_name: &str) -> Vec<(BinaryName, EdgeKind)> {
        let Some(idx) = self.get_node_by_name(binary_name) else {
            return Vec::new();
        };
        let mut edges: Vec<(BinaryName, EdgeKind)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight().is_dependency())
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Class(name) => Some((name.clone(), e.weight().clone())),
                GraphNode::Package(_) | GraphNode::Module(_) => None,
            })
            .collect();
        edges.sort();
        edges
    }

    /// Consumers that inline `owner.constant`.
    pub fn constant_consumers(&self, owner: &str, constant: &str) -> BTreeSet<BinaryName> {
        self.dependents(owner, |kind| {
            matches!(kind, EdgeKind::ConstantUsage { constant: c } if c == constant)
        })
    }

    /// Classes declared directly in `package`; sub-packages are separate pseudo-nodes.
    pub fn package_members(&self, package: &str) -> BTreeSet<BinaryName> {
        match self.package_to_node.get(package) {
            Some(&idx) => self.incoming_classes(idx, |k| *k == EdgeKind::PackageMembership),
            None => BTreeSet::new(),
        }
    }

    pub fn module_members(&self, module: &str) -> BTreeSet<BinaryName> {
        match self.module_to_node.get(module) {
            Some(&idx) => self.incoming_classes(idx, |k| *k == EdgeKind::ModuleMembership),
            None => BTreeSet::new(),
        }
    }

    /// Consumers whose reference to `binary_name` did not resolve when the graph was built.
    pub fn dangling_consumers(&self, binary_name: &str) -> BTreeSet<BinaryName> {
        self.dangling.get(binary_name).cloned().unwrap_or_default()
    }

    pub fn inconsistencies(&self) -> &[GraphInconsistency] {
        &self.inconsistencies
    }

    fn incoming_classes(
        &self,
        idx: NodeIndex,
        filter: impl Fn(&EdgeKind) -> bool,
    ) -> BTreeSet<BinaryName> {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| filter(e.weight()))
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Class(name) => Some(name.clone()),
                GraphNode::Package(_) | GraphNode::Module(_) => None,
            })
            .collect()
    }

    /// Edge set in a deterministic order, for persistence.
    pub fn edge_records(&self) -> Vec<EdgeRecord> {
        let mut records: Vec<EdgeRecord> = self
            .graph
            .edge_references()
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Class(from) => Some(EdgeRecord {
                    from: from.clone(),
                    to: self.graph[e.target()].clone(),
                    kind: e.weight().clone(),
                }),
                GraphNode::Package(_) | GraphNode::Module(_) => None,
            })
            .collect();
        records.sort();
        records
    }

    /// Edge counts by kind label.
    pub fn edge_summary(&self) -> BTreeMap<&'static str, usize> {
        let mut summary = BTreeMap::new();
        for edge in self.graph.edge_references() {
            *summary.entry(edge.weight().label()).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{ClassKind, ConstantRef, Retention};

    fn class(name: &str, package: &str) -> ClassAnalysis {
        ClassAnalysis {
            binary_name: name.to_string(),
            source_unit: format!("{}.java", name.replace('.', "/")),
            kind: ClassKind::Class,
            supertypes: Vec::new(),
            public_surface_hash: String::new(),
            declared_constants: BTreeMap::new(),
            used_constants: BTreeSet::new(),
            annotation_constants: BTreeSet::new(),
            annotation_types_used: BTreeMap::new(),
            type_references: BTreeSet::new(),
            package_name: package.to_string(),
            module_name: None,
            outer_class: None,
            module_directives: Vec::new(),
        }
    }

    #[test]
    fn test_typed_edges_and_dependents() {
        let a = class("p.A", "p");
        let mut b = class("p.B", "p");
        b.supertypes.push("p.A".into());
        let mut c = class("q.C", "q");
        c.type_references.insert("p.B".into());
        c.used_constants.insert(ConstantRef::new("p.A", "X"));

        let graph = DependencyGraph::build([&a, &b, &c]);
        assert_eq!(graph.class_count(), 3);
        assert_eq!(
            graph.dependents("p.A", EdgeKind::is_abi_sensitive),
            BTreeSet::from(["p.B".to_string()])
        );
        assert_eq!(
            graph.constant_consumers("p.A", "X"),
            BTreeSet::from(["q.C".to_string()])
        );
        assert!(graph.constant_consumers("p.A", "Y").is_empty());
        assert_eq!(
            graph.package_members("p"),
            BTreeSet::from(["p.A".to_string(), "p.B".to_string()])
        );
    }

    #[test]
    fn test_sub_package_is_separate_pseudo_node() {
        let a = class("p.A", "p");
        let s = class("p.sub.S", "p.sub");
        let graph = DependencyGraph::build([&a, &s]);
        assert_eq!(graph.package_members("p"), BTreeSet::from(["p.A".to_string()]));
    }

    #[test]
    fn test_unknown_targets_are_dangling_not_edges() {
        let mut a = class("p.A", "p");
        a.type_references.insert("java.lang.String".into());
        a.annotation_types_used
            .insert("p.Missing".into(), Retention::Runtime);
        let graph = DependencyGraph::build([&a]);
        assert_eq!(
            graph.dangling_consumers("java.lang.String"),
            BTreeSet::from(["p.A".to_string()])
        );
        assert_eq!(graph.dangling_consumers("p.Missing").len(), 1);
        // Only the membership edge exists.
        assert_eq!(graph.graph.edge_count(), 1);
    }

    #[test]
    fn test_cyclic_references_are_fine() {
        let mut a = class("p.A", "p");
        a.type_references.insert("p.B".into());
        let mut b = class("p.B", "p");
        b.type_references.insert("p.A".into());
        let graph = DependencyGraph::build([&a, &b]);
        assert_eq!(graph.dependents("p.A", |_| true).len(), 1);
        assert_eq!(graph.dependents("p.B", |_| true).len(), 1);
    }

    #[test]
    fn test_restore_reproduces_edge_set() {
        let a = class("p.A", "p");
        let mut b = class("p.B", "p");
        b.type_references.insert("p.A".into());
        b.used_constants.insert(ConstantRef::new("p.A", "X"));
        let built = DependencyGraph::build([&a, &b]);
        let restored = DependencyGraph::restore([&a, &b], &built.edge_records());
        assert_eq!(built.edge_records(), restored.edge_records());
        assert!(restored.inconsistencies().is_empty());
    }

    #[test]
    fn test_restore_records_dangling_persisted_edge() {
        let a = class("p.A", "p");
        let edges = vec![EdgeRecord {
            from: "p.A".into(),
            to: GraphNode::Class("p.Gone".into()),
            kind: EdgeKind::TypeReference,
        }];
        let graph = DependencyGraph::restore([&a], &edges);
        assert_eq!(
            graph.inconsistencies(),
            &[GraphInconsistency {
                consumer: "p.A".into(),
                missing: "p.Gone".into(),
                edge: "type-reference".into(),
            }]
        );
    }
}
