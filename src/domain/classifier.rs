use crate::domain::analysis::{BinaryName, ClassAnalysis, ClassKind};
use crate::domain::ports::DiagnosticsSink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delta between two snapshots of one class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "change", content = "constant", rename_all = "snake_case")]
pub enum ClassChange {
    Added,
    Removed,
    Unchanged,
    AbiChanged,
    ConstantValueChanged(String),
}

/// Everything the classifier found for one binary name. `changes` holds either exactly one of
/// `Added` / `Removed` / `Unchanged`, or `AbiChanged` and/or any number of
/// `ConstantValueChanged`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub binary_name: BinaryName,
    pub changes: Vec<ClassChange>,
    /// module-info only: `requires` directives present before and gone now.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lost_requires: Vec<String>,
}

impl Classification {
    fn single(binary_name: &str, change: ClassChange) -> Self {
        Self {
            binary_name: binary_name.to_string(),
            changes: vec![change],
            lost_requires: Vec::new(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.changes == [ClassChange::Unchanged]
    }

    pub fn is_added(&self) -> bool {
        self.changes.contains(&ClassChange::Added)
    }

    pub fn is_removed(&self) -> bool {
        self.changes.contains(&ClassChange::Removed)
    }

    pub fn abi_changed(&self) -> bool {
        self.changes.contains(&ClassChange::AbiChanged)
    }

    pub fn changed_constants(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().filter_map(|c| match c {
            ClassChange::ConstantValueChanged(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Change classifier - compares the prior and current analysis of one class
pub struct ChangeClassifier;

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        binary_name: &str,
        previous: Option<&ClassAnalysis>,
        current: Option<&ClassAnalysis>,
    ) -> Classification {
        let (previous, current) = match (previous, current) {
            (None, None) => return Classification::single(binary_name, ClassChange::Unchanged),
            (None, Some(_)) => return Classification::single(binary_name, ClassChange::Added),
            (Some(_), None) => return Classification::single(binary_name, ClassChange::Removed),
            (Some(previous), Some(current)) => (previous, current),
        };

        let mut changes = Vec::new();
        let shape_changed = match (previous.kind, current.kind) {
            (ClassKind::Class, ClassKind::Class)
            | (ClassKind::Interface, ClassKind::Interface)
            | (ClassKind::Record, ClassKind::Record)
            | (ClassKind::AnnotationType, ClassKind::AnnotationType)
            | (ClassKind::PackageInfo, ClassKind::PackageInfo)
            | (ClassKind::ModuleInfo, ClassKind::ModuleInfo) => {
                previous.public_surface_hash != current.public_surface_hash
            }
            // e.g. class → interface: every consumer's linkage is invalid
            (
                ClassKind::Class
                | ClassKind::Interface
                | ClassKind::Record
                | ClassKind::AnnotationType
                | ClassKind::PackageInfo
                | ClassKind::ModuleInfo,
                _,
            ) => true,
        };
        if shape_changed {
            changes.push(ClassChange::AbiChanged);
        }

        let names: BTreeSet<&String> = previous
            .declared_constants
            .keys()
            .chain(current.declared_constants.keys())
            .collect();
        for name in names {
            if previous.declared_constants.get(name) != current.declared_constants.get(name) {
                changes.push(ClassChange::ConstantValueChanged(name.clone()));
            }
        }

        if changes.is_empty() {
            changes.push(ClassChange::Unchanged);
        }

        let current_requires = current.required_modules();
        let lost_requires = previous
            .required_modules()
            .into_iter()
            .filter(|module| !current_requires.contains(module))
            .map(str::to_string)
            .collect();

        Classification {
            binary_name: binary_name.to_string(),
            changes,
            lost_requires,
        }
    }

    /// Classify and hand the decision to `sink`.
    pub fn classify_and_report(
        &self,
        binary_name: &str,
        previous: Option<&ClassAnalysis>,
        current: Option<&ClassAnalysis>,
        sink: &dyn DiagnosticsSink,
    ) -> Classification {
        let classification = self.classify(binary_name, previous, current);
        sink.classified(&classification);
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{ConstValue, ModuleDirective};
    use std::collections::BTreeMap;

    fn analysis(name: &str, hash: &str) -> ClassAnalysis {
        ClassAnalysis {
            binary_name: name.to_string(),
            source_unit: "A.java".into(),
            kind: ClassKind::Class,
            supertypes: Vec::new(),
            public_surface_hash: hash.to_string(),
            declared_constants: BTreeMap::new(),
            used_constants: BTreeSet::new(),
            annotation_constants: BTreeSet::new(),
            annotation_types_used: BTreeMap::new(),
            type_references: BTreeSet::new(),
            package_name: String::new(),
            module_name: None,
            outer_class: None,
            module_directives: Vec::new(),
        }
    }

    #[test]
    fn test_added_removed_unchanged() {
        let classifier = ChangeClassifier::new();
        let a = analysis("A", "h");
        assert!(classifier.classify("A", None, Some(&a)).is_added());
        assert!(classifier.classify("A", Some(&a), None).is_removed());
        assert!(classifier.classify("A", Some(&a), Some(&a)).is_unchanged());
    }

    #[test]
    fn test_hash_change_is_abi_change() {
        let classifier = ChangeClassifier::new();
        let c = classifier.classify("A", Some(&analysis("A", "1")), Some(&analysis("A", "2")));
        assert_eq!(c.changes, vec![ClassChange::AbiChanged]);
    }

    #[test]
    fn test_kind_change_is_abi_change_even_with_equal_hash() {
        let classifier = ChangeClassifier::new();
        let before = analysis("A", "h");
        let mut after = analysis("A", "h");
        after.kind = ClassKind::Interface;
        assert!(classifier.classify("A", Some(&before), Some(&after)).abi_changed());
    }

    #[test]
    fn test_constant_changes_alongside_abi_change() {
        let classifier = ChangeClassifier::new();
        let mut before = analysis("A", "1");
        before.declared_constants.insert("X".into(), ConstValue::Int(1));
        before.declared_constants.insert("GONE".into(), ConstValue::Int(0));
        before.declared_constants.insert("SAME".into(), ConstValue::Int(7));
        let mut after = analysis("A", "2");
        after.declared_constants.insert("X".into(), ConstValue::Int(2));
        after.declared_constants.insert("NEW".into(), ConstValue::Int(0));
        after.declared_constants.insert("SAME".into(), ConstValue::Int(7));

        let c = classifier.classify("A", Some(&before), Some(&after));
        assert!(c.abi_changed());
        assert_eq!(c.changed_constants().collect::<Vec<_>>(), vec!["GONE", "NEW", "X"]);
    }

    #[test]
    fn test_constant_only_change() {
        let classifier = ChangeClassifier::new();
        let mut before = analysis("A", "h");
        before.declared_constants.insert("X".into(), ConstValue::Str("a".into()));
        let mut after = analysis("A", "h");
        after.declared_constants.insert("X".into(), ConstValue::Str("b".into()));
        let c = classifier.classify("A", Some(&before), Some(&after));
        assert_eq!(c.changes, vec![ClassChange::ConstantValueChanged("X".into())]);
    }

    #[test]
    fn test_lost_requires_reported() {
        let classifier = ChangeClassifier::new();
        let mut before = analysis("app/module-info", "1");
        before.kind = ClassKind::ModuleInfo;
        before.module_directives = vec![
            ModuleDirective::requires("lib"),
            ModuleDirective::requires("util"),
        ];
        let mut after = before.clone();
        after.public_surface_hash = "2".into();
        after.module_directives = vec![ModuleDirective::requires("util")];
        let c = classifier.classify("app/module-info", Some(&before), Some(&after));
        assert_eq!(c.lost_requires, vec!["lib".to_string()]);
    }
}
