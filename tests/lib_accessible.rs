//! Sanity check: library and test common module are accessible.

mod common;

use jvm_recompile::domain::baseline::Baseline;
use jvm_recompile::domain::ports::{BaselineStore, UnitSource};

#[test]
fn test_library_accessible() {
    let baseline = Baseline::new();
    assert!(baseline.classes.is_empty());
    assert_eq!(baseline.graph().inconsistencies().len(), 0);
}

#[test]
fn test_mock_unit_source() {
    use common::fixtures::{TypeBuilder, single};
    use common::mock::MockUnitSource;

    let source = MockUnitSource::new().with_unit(single("p", TypeBuilder::class("p.A")));
    let snapshot = source.snapshot().unwrap();
    assert_eq!(snapshot.get("p/A.java").map(String::as_str), Some("1"));
    assert!(source.describe("p/A.java").is_ok());
    assert!(source.describe("p/Missing.java").is_err());
}

#[test]
fn test_memory_baseline_store() {
    use common::mock::MemoryBaselineStore;

    let store = MemoryBaselineStore::new();
    assert!(store.load().unwrap().is_none());
    store.save(&Baseline::new()).unwrap();
    assert_eq!(store.load().unwrap(), Some(Baseline::new()));
    assert_eq!(store.saves(), 1);
}

#[test]
fn test_fixture_unit_paths() {
    use common::fixtures::*;

    assert_eq!(single("p.q", TypeBuilder::class("p.q.A")).path, "p/q/A.java");
    assert_eq!(
        package_info_unit("p.q", TypeBuilder::package_info("p.q")).path,
        "p/q/package-info.java"
    );
    assert_eq!(
        module_info_unit("m", TypeBuilder::module_info("m")).path,
        "m/module-info.java"
    );
}
