use crate::domain::baseline::Snapshot;
use crate::domain::descriptor::UnitDescriptor;
use crate::domain::ports::UnitSource;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk workspace description produced by a front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub units: Vec<UnitDescriptor>,
}

/// Unit source backed by a workspace JSON file (`{"units": [...]}`)
#[derive(Debug, Clone, Default)]
pub struct JsonUnitSource {
    units: BTreeMap<String, UnitDescriptor>,
}

impl JsonUnitSource {
    pub fn new(units: Vec<UnitDescriptor>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.path.clone(), u)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workspace file: {}", path.display()))?;
        let workspace: WorkspaceFile =
            serde_json::from_str(&json).context("Failed to parse workspace JSON")?;
        Ok(Self::new(workspace.units))
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.units.values()
    }
}

impl UnitSource for JsonUnitSource {
    fn snapshot(&self) -> Result<Snapshot> {
        Ok(self
            .units
            .values()
            .map(|u| (u.path.clone(), u.content_hash.clone()))
            .collect())
    }

    fn describe(&self, unit: &str) -> Result<UnitDescriptor> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| anyhow!("Unit not found in workspace: {}", unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_workspace_file() {
        let json = r#"{
            "units": [
                {
                    "path": "com/acme/A.java",
                    "content_hash": "1",
                    "package": "com.acme",
                    "types": [{ "binary_name": "com.acme.A", "kind": "class" }]
                }
            ]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let source = JsonUnitSource::load(file.path()).unwrap();
        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot["com/acme/A.java"], "1");
        let unit = source.describe("com/acme/A.java").unwrap();
        assert_eq!(unit.types[0].binary_name, "com.acme.A");
        assert!(source.describe("missing.java").is_err());
    }
}
