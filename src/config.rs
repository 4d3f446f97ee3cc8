//! Engine configuration: rule table, meta-group partition, imputer settings.
//!
//! Everything the engine treats as policy lives here so it can be loaded
//! from a JSON file instead of recompiled. Built-in defaults reproduce the
//! reference segmentation.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::impute::ImputeParams;
use crate::meta::MetaGroupConfig;
use crate::segment::{default_rules, validate_rules, SegmentRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Segment rules in evaluation order.
    pub rules: Vec<SegmentRule>,
    /// Meta-group thresholds and imputation target sets.
    pub meta: MetaGroupConfig,
    /// Neighbor count and distance metric for imputation.
    pub impute: ImputeParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rules: default_rules(),
            meta: MetaGroupConfig::default(),
            impute: ImputeParams::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration file. Fields omitted from the file
    /// keep their defaults.
    pub fn from_json_file(path: &Path) -> crate::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on malformed configuration, before any customer is scored.
    pub fn validate(&self) -> crate::Result<()> {
        validate_rules(&self.rules)?;
        self.meta.validate()?;
        self.impute.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impute::DistanceMetric;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.len(), 11);
        assert_eq!(config.impute.k, 1);
    }

    #[test]
    fn test_partial_json_overrides_keep_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"impute": {{"k": 3, "metric": "manhattan"}}}}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.impute.k, 3);
        assert_eq!(config.impute.metric, DistanceMetric::Manhattan);
        // Rule table keeps its default.
        assert_eq!(config.rules.len(), 11);
    }

    #[test]
    fn test_invalid_config_file_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"rules": []}}"#).unwrap();
        assert!(EngineConfig::from_json_file(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(EngineConfig::from_json_file(file.path()).is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
