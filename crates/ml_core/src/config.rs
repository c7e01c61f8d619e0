//! Configuration for the price inference service

use crate::errors::{PricingError, Result};
use crate::seasonal::SeasonalPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_ARTIFACT_DIR: &str = "AGRIRENT_ARTIFACT_DIR";
pub const ENV_LOG_LEVEL: &str = "AGRIRENT_LOG_LEVEL";
pub const ENV_DEFAULT_MONTH: &str = "AGRIRENT_DEFAULT_MONTH";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub artifacts: ArtifactConfig,
    pub features: FeatureConfig,
    pub logging: LoggingConfig,
}

/// Where artifacts live and what they must hash to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding `<name>.json` envelopes
    pub directory: PathBuf,
    /// Expected blake3 fingerprint of regressor A
    pub regressor_scaled_hash: Option<String>,
    /// Expected blake3 fingerprint of regressor B
    pub regressor_numeric_hash: Option<String>,
    /// Expected blake3 fingerprint of regressor C
    pub regressor_categorical_hash: Option<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("models"),
            regressor_scaled_hash: None,
            regressor_numeric_hash: None,
            regressor_categorical_hash: None,
        }
    }
}

/// Seasonal scoring knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Month used when `created_at` does not parse
    pub default_month: u32,
    /// Scores above this are peak season
    pub peak_threshold: f64,
    /// Scores below this are off season
    pub off_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        let policy = SeasonalPolicy::default();
        Self {
            default_month: policy.default_month,
            peak_threshold: policy.peak_threshold,
            off_threshold: policy.off_threshold,
        }
    }
}

impl FeatureConfig {
    /// Seasonal policy for these settings; crossed thresholds are an error.
    pub fn seasonal_policy(&self) -> Result<SeasonalPolicy> {
        let policy = SeasonalPolicy {
            default_month: self.default_month,
            peak_threshold: self.peak_threshold,
            off_threshold: self.off_threshold,
        };
        policy.check()?;
        Ok(policy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PricingConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| PricingError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PricingError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply `AGRIRENT_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_ARTIFACT_DIR) {
            self.artifacts.directory = PathBuf::from(val);
        }

        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = val;
        }

        if let Some(val) = lookup(ENV_DEFAULT_MONTH) {
            match val.trim().parse::<u32>() {
                Ok(month) => self.features.default_month = month,
                Err(_) => warn!("Ignoring {}={:?}: not a month number", ENV_DEFAULT_MONTH, val),
            }
        }
    }

    /// Defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Validate configuration; problems that do not stop startup come back
    /// as warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let features = &self.features;

        features.seasonal_policy()?;

        if features.peak_threshold >= 1.5 {
            warnings.push(
                "peak_threshold >= 1.5, scores are clamped there so peak never fires".to_string(),
            );
        }

        if features.off_threshold <= 0.5 {
            warnings.push(
                "off_threshold <= 0.5, scores are clamped there so off never fires".to_string(),
            );
        }

        let hashes = [
            ("regressor_scaled_hash", &self.artifacts.regressor_scaled_hash),
            ("regressor_numeric_hash", &self.artifacts.regressor_numeric_hash),
            ("regressor_categorical_hash", &self.artifacts.regressor_categorical_hash),
        ];
        for (key, hash) in hashes {
            if let Some(hash) = hash {
                if hash.len() != 64 || hex::decode(hash).is_err() {
                    warnings.push(format!("{key} is not a 64-character hex digest"));
                }
            }
        }

        if !self.artifacts.directory.exists() {
            warnings.push(format!(
                "Artifact directory {} does not exist",
                self.artifacts.directory.display()
            ));
        }

        if warnings.is_empty() {
            info!("Configuration validation passed");
        } else {
            warn!("Configuration validation warnings: {:?}", warnings);
        }

        Ok(warnings)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| PricingError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_seasonal_policy() {
        let config = PricingConfig::default();
        assert_eq!(config.features.seasonal_policy().unwrap(), SeasonalPolicy::default());
        assert_eq!(config.artifacts.directory, PathBuf::from("models"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PricingConfig::from_toml(
            r#"
            [artifacts]
            directory = "/srv/agrirent/models"

            [features]
            peak_threshold = 1.2
            "#,
        )
        .unwrap();
        assert_eq!(config.artifacts.directory, PathBuf::from("/srv/agrirent/models"));
        assert_eq!(config.features.peak_threshold, 1.2);
        assert_eq!(config.features.off_threshold, 0.9);
        assert_eq!(config.features.default_month, 6);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = PricingConfig::from_toml("[features\n").unwrap_err();
        assert!(matches!(err, PricingError::Config(_)));
    }

    #[test]
    fn overrides_apply_in_order() {
        let env: HashMap<&str, &str> = [
            (ENV_ARTIFACT_DIR, "/tmp/models"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_DEFAULT_MONTH, "eleven"),
        ]
        .into_iter()
        .collect();
        let mut config = PricingConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.artifacts.directory, PathBuf::from("/tmp/models"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.features.default_month, 6);

        config.apply_overrides(|k| (k == ENV_DEFAULT_MONTH).then(|| "11".to_string()));
        assert_eq!(config.features.default_month, 11);
    }

    #[test]
    fn validate_reports_warnings_and_errors() {
        let dir = TempDir::new().unwrap();
        let mut config = PricingConfig::default();
        config.artifacts.directory = dir.path().to_path_buf();
        assert!(config.validate().unwrap().is_empty());

        config.features.off_threshold = 0.4;
        config.artifacts.regressor_numeric_hash = Some("abc".to_string());
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 2);

        config.features.default_month = 13;
        assert!(config.validate().is_err());
    }

    #[test]
    fn crossed_thresholds_fail_validation() {
        let mut config = PricingConfig::default();
        config.features.peak_threshold = 0.8;
        config.features.off_threshold = 0.9;
        assert!(matches!(config.validate(), Err(PricingError::Config(_))));
        assert!(config.features.seasonal_policy().is_err());
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agrirent.toml");
        let mut config = PricingConfig::default();
        config.artifacts.regressor_scaled_hash = Some("ab".repeat(32));
        config.save_to_file(&path).unwrap();
        assert_eq!(PricingConfig::load_from_file(&path).unwrap(), config);
    }
}
