use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning, loaded from an optional JSON file and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Propagation rounds before the build is declared non-terminating.
    pub max_rounds: usize,
    /// Analysis batches at least this large run on the rayon pool.
    pub parallel_threshold: usize,
    /// Size of the analysis pool; `None` uses rayon's global pool.
    pub worker_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 1_000,
            parallel_threshold: 32,
            worker_threads: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "max_rounds": 5 }"#).unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.parallel_threshold, 32);
        assert_eq!(config.worker_threads, None);
    }

    #[test]
    fn test_missing_path_is_default() {
        assert_eq!(
            EngineConfig::load_or_default(None).unwrap(),
            EngineConfig::default()
        );
    }
}
