//! Configuration loading, validation, and management for gapfill.
//!
//! Loads configuration from `./gapfill.toml` (or an explicit path) with
//! environment variable overrides. Validates all settings at startup.

use gapfill_core::forecast::QuantileLevel;
use gapfill_core::frame::{DEFAULT_ID_COLUMN, DEFAULT_SERIES_ID, DEFAULT_TIMESTAMP_COLUMN, YearRange};
use gapfill_core::series::Target;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "gapfill.toml";

/// Forecaster backends understood by `gapfill-forecasters`.
pub const KNOWN_BACKENDS: &[&str] = &["http", "replay"];

/// The root configuration structure.
///
/// Maps directly to `gapfill.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output file locations
    #[serde(default)]
    pub data: DataConfig,

    /// Imputation range, series identifier, and quantile levels
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Forecasting backend
    #[serde(default)]
    pub forecaster: ForecasterConfig,

    /// Figure output
    #[serde(default)]
    pub plots: PlotsConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_original")]
    pub original: PathBuf,

    #[serde(default = "default_hare_choices")]
    pub hare_choices: PathBuf,

    #[serde(default = "default_lynx_choices")]
    pub lynx_choices: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_original() -> PathBuf {
    "data/lotka_volterra_data.csv".into()
}
fn default_hare_choices() -> PathBuf {
    "data/chosen_quantiles_hare.csv".into()
}
fn default_lynx_choices() -> PathBuf {
    "data/chosen_quantiles_lynx.csv".into()
}
fn default_output() -> PathBuf {
    "output.csv".into()
}

impl DataConfig {
    /// The choice table for one target.
    pub fn choices(&self, target: Target) -> &Path {
        match target {
            Target::Hare => &self.hare_choices,
            Target::Lynx => &self.lynx_choices,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            original: default_original(),
            hare_choices: default_hare_choices(),
            lynx_choices: default_lynx_choices(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First year to impute (inclusive)
    #[serde(default = "default_impute_start")]
    pub impute_start: i32,

    /// Last year to impute (inclusive)
    #[serde(default = "default_impute_end")]
    pub impute_end: i32,

    /// Identifier attached to every context/future row
    #[serde(default = "default_series_id")]
    pub series_id: String,

    /// Quantile levels requested from the forecaster
    #[serde(default = "default_quantile_levels")]
    pub quantile_levels: Vec<f64>,

    #[serde(default = "default_id_column")]
    pub id_column: String,

    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
}

fn default_impute_start() -> i32 {
    1936
}
fn default_impute_end() -> i32 {
    2025
}
fn default_series_id() -> String {
    DEFAULT_SERIES_ID.into()
}
fn default_quantile_levels() -> Vec<f64> {
    vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9]
}
fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.into()
}
fn default_timestamp_column() -> String {
    DEFAULT_TIMESTAMP_COLUMN.into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            impute_start: default_impute_start(),
            impute_end: default_impute_end(),
            series_id: default_series_id(),
            quantile_levels: default_quantile_levels(),
            id_column: default_id_column(),
            timestamp_column: default_timestamp_column(),
        }
    }
}

impl PipelineConfig {
    pub fn impute_range(&self) -> Result<YearRange, ConfigError> {
        YearRange::new(self.impute_start, self.impute_end)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn levels(&self) -> Result<Vec<QuantileLevel>, ConfigError> {
        self.quantile_levels
            .iter()
            .map(|&p| {
                QuantileLevel::new(p).ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "quantile level {p} must be strictly between 0 and 1"
                    ))
                })
            })
            .collect()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    /// "http" (remote model server) or "replay" (saved forecast tables)
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Checkpoint the server should load
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory of saved forecast tables, `<dir>/<Target>.csv`
    #[serde(default = "default_replay_dir")]
    pub replay_dir: PathBuf,
}

fn default_backend() -> String {
    "http".into()
}
fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_model() -> String {
    "amazon/chronos-2".into()
}
fn default_device() -> String {
    "cpu".into()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_replay_dir() -> PathBuf {
    "forecasts".into()
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            model: default_model(),
            device: default_device(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            replay_dir: default_replay_dir(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ForecasterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecasterConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("device", &self.device)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("replay_dir", &self.replay_dir)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_plots_dir")]
    pub dir: PathBuf,

    /// Keep null imputed years as gaps in the dashed trace
    #[serde(default = "default_true")]
    pub show_gaps: bool,
}

fn default_plots_dir() -> PathBuf {
    "plots".into()
}

impl Default for PlotsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_plots_dir(),
            show_gaps: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or `./gapfill.toml` when `None`.
    ///
    /// Then applies environment overrides:
    /// - `GAPFILL_FORECASTER_URL`
    /// - `GAPFILL_API_KEY`
    /// - `GAPFILL_BACKEND`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The config file used when none is given.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GAPFILL_FORECASTER_URL") {
            self.forecaster.base_url = url;
        }
        if let Some(key) = lookup("GAPFILL_API_KEY") {
            self.forecaster.api_key = Some(key);
        }
        if let Some(backend) = lookup("GAPFILL_BACKEND") {
            self.forecaster.backend = backend;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.impute_range()?;

        let levels = self.pipeline.levels()?;
        if levels.is_empty() {
            return Err(ConfigError::ValidationError(
                "quantile_levels must not be empty".into(),
            ));
        }
        let mut labels: Vec<String> = levels.iter().map(|l| l.label()).collect();
        labels.sort();
        labels.dedup();
        if labels.len() != levels.len() {
            return Err(ConfigError::ValidationError(
                "quantile_levels must be distinct".into(),
            ));
        }

        if self.pipeline.series_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "series_id must not be empty".into(),
            ));
        }

        if !KNOWN_BACKENDS.contains(&self.forecaster.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown forecaster backend '{}' (expected one of: {})",
                self.forecaster.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if self.forecaster.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "forecaster.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for gapfill_core::Error {
    fn from(e: ConfigError) -> Self {
        gapfill_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.impute_start, 1936);
        assert_eq!(config.pipeline.impute_end, 2025);
        assert_eq!(config.pipeline.series_id, "series-A");
        assert_eq!(config.forecaster.backend, "http");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.pipeline.series_id, config.pipeline.series_id);
        assert_eq!(parsed.data.output, config.data.output);
        assert_eq!(parsed.pipeline.quantile_levels.len(), 9);
    }

    #[test]
    fn inverted_range_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.impute_start = 2000;
        config.pipeline.impute_end = 1990;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_bounds_level_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.quantile_levels = vec![0.5, 1.0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly between"));
    }

    #[test]
    fn duplicate_levels_rejected() {
        let mut config = AppConfig::default();
        config.pipeline.quantile_levels = vec![0.5, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.forecaster.backend = "onnx".into();
        assert!(config.validate().unwrap_err().to_string().contains("onnx"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/gapfill.toml"));
        let config = result.unwrap();
        assert_eq!(config.pipeline.impute_start, 1936);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gapfill.toml");
        std::fs::write(
            &path,
            r#"
[pipeline]
impute_start = 1936
impute_end = 1940

[forecaster]
backend = "replay"
replay_dir = "saved"
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.pipeline.impute_range().unwrap().len(), 5);
        assert_eq!(config.forecaster.backend, "replay");
        assert_eq!(config.forecaster.replay_dir, PathBuf::from("saved"));
        assert_eq!(config.pipeline.series_id, "series-A");
        assert_eq!(config.data.original, default_original());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gapfill.toml");
        std::fs::write(&path, "[pipeline\nimpute_start = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("GAPFILL_FORECASTER_URL", "http://gpu-box:9000"),
            ("GAPFILL_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.forecaster.base_url, "http://gpu-box:9000");
        assert_eq!(config.forecaster.api_key.as_deref(), Some("secret"));
        assert_eq!(config.forecaster.backend, "http");
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.forecaster.api_key = Some("hunter2".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn choices_path_per_target() {
        let config = AppConfig::default();
        assert!(config.data.choices(Target::Hare).ends_with("chosen_quantiles_hare.csv"));
        assert!(config.data.choices(Target::Lynx).ends_with("chosen_quantiles_lynx.csv"));
    }
}
