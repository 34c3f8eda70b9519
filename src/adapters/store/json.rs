use crate::domain::baseline::{BASELINE_VERSION, Baseline};
use crate::domain::ports::BaselineStore;
use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Baseline stored as one pretty-printed JSON document
pub struct JsonBaselineStore {
    path: PathBuf,
}

impl JsonBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize deterministically: every map in the model is a `BTreeMap` and the edge set is
/// sorted, so equal baselines always produce equal bytes.
pub fn to_json(baseline: &Baseline) -> Result<String> {
    let mut json =
        serde_json::to_string_pretty(baseline).context("Failed to serialize baseline")?;
    json.push('\n');
    Ok(json)
}

pub fn from_json(json: &str) -> Result<Baseline> {
    let baseline: Baseline = serde_json::from_str(json).context("Failed to parse baseline JSON")?;
    if baseline.version != BASELINE_VERSION {
        bail!(
            "Unsupported baseline version {} (expected {})",
            baseline.version,
            BASELINE_VERSION
        );
    }
    Ok(baseline)
}

impl BaselineStore for JsonBaselineStore {
    fn load(&self) -> Result<Option<Baseline>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read baseline: {}", self.path.display()))?;
        from_json(&json)
            .with_context(|| format!("Invalid baseline: {}", self.path.display()))
            .map(Some)
    }

    /// Write to a temporary file next to the target, then rename over it.
    fn save(&self, baseline: &Baseline) -> Result<()> {
        let json = to_json(baseline)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write baseline")?;
        tmp.as_file().sync_all().context("Failed to sync baseline")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace baseline: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_no_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBaselineStore::new(dir.path().join("baseline.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBaselineStore::new(dir.path().join("nested/baseline.json"));
        let mut baseline = Baseline::new();
        baseline.units.insert("A.java".into(), "abc".into());
        store.save(&baseline).unwrap();
        assert_eq!(store.load().unwrap(), Some(baseline));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut baseline = Baseline::new();
        baseline.version = BASELINE_VERSION + 1;
        let json = serde_json::to_string(&baseline).unwrap();
        assert!(from_json(&json).is_err());
    }
}
