//! Pipeline configuration.
//!
//! Defaults match the published BT-RADS thresholds and the retrieval settings
//! the extraction prompts were tuned with. A JSON file may override any
//! subset of fields, and `BTRADS_*` environment variables override both.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidVar { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Retrieval
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_n: usize,
    pub rerank_top_k: usize,
    pub semantic_weight: f32,
    pub lexical_weight: f32,

    // BT-RADS thresholds
    /// Percent change within which a signal counts as stable (±).
    pub stability_threshold_pct: f64,
    /// Percent increase above which worsening is major.
    pub progression_threshold_pct: f64,
    /// Smallest absolute volume change in mL that counts as measurable.
    pub measurable_change_ml: f64,
    /// Days after radiation during which worsening favors treatment effect.
    pub treatment_window_days: i64,

    // Inference
    pub ollama_url: String,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub retrieval_timeout_secs: u64,
    /// Total inference attempts per extraction, first call included.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub idle_timeout_secs: u64,
    pub full_report_max_chars: usize,
    pub allow_pattern_fallback: bool,
    /// Extraction confidence below which a fact is reported as missing.
    pub missing_info_confidence_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            retrieval_top_n: 5,
            rerank_top_k: 3,
            semantic_weight: 0.6,
            lexical_weight: 0.4,
            stability_threshold_pct: 10.0,
            progression_threshold_pct: 40.0,
            measurable_change_ml: 1.0,
            treatment_window_days: 90,
            ollama_url: config::DEFAULT_OLLAMA_URL.to_string(),
            model: config::DEFAULT_MODEL.to_string(),
            connect_timeout_secs: 10,
            generation_timeout_secs: 120,
            retrieval_timeout_secs: 30,
            max_attempts: 3,
            retry_backoff_ms: 500,
            idle_timeout_secs: 600,
            full_report_max_chars: 65_000,
            allow_pattern_fallback: false,
            missing_info_confidence_threshold: 70.0,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `BTRADS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, then validate.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        override_var(&lookup, "BTRADS_CHUNK_SIZE", &mut self.chunk_size)?;
        override_var(&lookup, "BTRADS_CHUNK_OVERLAP", &mut self.chunk_overlap)?;
        override_var(&lookup, "BTRADS_RETRIEVAL_TOP_N", &mut self.retrieval_top_n)?;
        override_var(&lookup, "BTRADS_RERANK_TOP_K", &mut self.rerank_top_k)?;
        override_var(&lookup, "BTRADS_SEMANTIC_WEIGHT", &mut self.semantic_weight)?;
        override_var(&lookup, "BTRADS_LEXICAL_WEIGHT", &mut self.lexical_weight)?;
        override_var(&lookup, "BTRADS_STABILITY_PCT", &mut self.stability_threshold_pct)?;
        override_var(&lookup, "BTRADS_PROGRESSION_PCT", &mut self.progression_threshold_pct)?;
        override_var(&lookup, "BTRADS_MEASURABLE_ML", &mut self.measurable_change_ml)?;
        override_var(&lookup, "BTRADS_TREATMENT_WINDOW_DAYS", &mut self.treatment_window_days)?;
        override_var(&lookup, "BTRADS_OLLAMA_URL", &mut self.ollama_url)?;
        override_var(&lookup, "BTRADS_MODEL", &mut self.model)?;
        override_var(&lookup, "BTRADS_GENERATION_TIMEOUT_SECS", &mut self.generation_timeout_secs)?;
        override_var(&lookup, "BTRADS_RETRIEVAL_TIMEOUT_SECS", &mut self.retrieval_timeout_secs)?;
        override_var(&lookup, "BTRADS_MAX_ATTEMPTS", &mut self.max_attempts)?;
        override_var(&lookup, "BTRADS_IDLE_TIMEOUT_SECS", &mut self.idle_timeout_secs)?;
        override_var(&lookup, "BTRADS_ALLOW_PATTERN_FALLBACK", &mut self.allow_pattern_fallback)?;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_top_n == 0 || self.rerank_top_k == 0 {
            return Err(ConfigError::Invalid("top-N and top-K must be positive".into()));
        }
        if (self.semantic_weight + self.lexical_weight - 1.0).abs() > 1e-3
            || self.semantic_weight < 0.0
            || self.lexical_weight < 0.0
        {
            return Err(ConfigError::Invalid(
                "semantic and lexical weights must be non-negative and sum to 1".into(),
            ));
        }
        if self.stability_threshold_pct <= 0.0
            || self.progression_threshold_pct <= self.stability_threshold_pct
            || self.measurable_change_ml <= 0.0
            || self.treatment_window_days <= 0
        {
            return Err(ConfigError::Invalid(
                "thresholds must be positive and progression must exceed stability".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn override_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { key, value: raw })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.retrieval_top_n, 5);
        assert_eq!(config.rerank_top_k, 3);
        assert_eq!(config.treatment_window_days, 90);
        assert_eq!(config.model, "phi4:14b");
    }

    #[test]
    fn file_overrides_subset_of_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"chunk_size": 500, "chunk_overlap": 100}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.rerank_top_k, 3);
    }

    #[test]
    fn file_with_invalid_overlap_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"chunk_size": 100, "chunk_overlap": 100}"#).unwrap();

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("BTRADS_MODEL", "llama3:8b"),
            ("BTRADS_RERANK_TOP_K", "4"),
            ("BTRADS_ALLOW_PATTERN_FALLBACK", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model, "llama3:8b");
        assert_eq!(config.rerank_top_k, 4);
        assert!(config.allow_pattern_fallback);
    }

    #[test]
    fn unparsable_override_names_key() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(|k| (k == "BTRADS_CHUNK_SIZE").then(|| "big".to_string()))
            .unwrap_err();
        match err {
            ConfigError::InvalidVar { key, value } => {
                assert_eq!(key, "BTRADS_CHUNK_SIZE");
                assert_eq!(value, "big");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn weights_must_sum_to_one() {
        let config = PipelineConfig {
            semantic_weight: 0.7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
