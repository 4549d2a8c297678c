//! LiqWatch configuration, stored as TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.
//! Lookup order for [`LiqwatchConfig::load`]: explicit path, `./liqwatch.toml`,
//! `{config_dir}/liqwatch/config.toml`, built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::anomaly::{AnomalyDetector, AnomalyScorer, DetectorKind, IsolationForest, ZScoreThreshold};
use crate::data::{Lookback, RetryPolicy};
use crate::features::{DEFAULT_WINDOW, MIN_WINDOW};

pub const LOCAL_CONFIG_FILE: &str = "liqwatch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiqwatchConfig {
    /// Tickers refreshed by the batch job and offered by the dashboard.
    pub universe: Vec<String>,
    pub cache: CacheSettings,
    pub source: SourceSettings,
    pub features: FeatureSettings,
    pub anomaly: AnomalySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub lookback: Lookback,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    /// Cap on any single retry wait, including a provider `Retry-After`.
    pub retry_max_delay_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Trailing window for the illiquidity z-score.
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalySettings {
    pub detector: DetectorKind,
    pub outlier_fraction: f64,
    pub seed: u64,
    pub min_samples: usize,
    pub n_trees: usize,
    pub max_samples: usize,
    pub zscore_k: f64,
}

impl Default for LiqwatchConfig {
    fn default() -> Self {
        Self {
            universe: ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]
                .into_iter()
                .map(String::from)
                .collect(),
            cache: CacheSettings::default(),
            source: SourceSettings::default(),
            features: FeatureSettings::default(),
            anomaly: AnomalySettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data").join("features"),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            lookback: Lookback::SIX_MONTHS,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_ms: 500,
            retry_max_delay_secs: 30,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            detector: DetectorKind::IsolationForest,
            outlier_fraction: 0.05,
            seed: 42,
            min_samples: crate::anomaly::DEFAULT_MIN_SAMPLES,
            n_trees: 100,
            max_samples: 256,
            zscore_k: 3.0,
        }
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_delay: Duration::from_secs(self.retry_max_delay_secs),
        }
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

impl AnomalySettings {
    pub fn detector(&self) -> Box<dyn AnomalyDetector> {
        match self.detector {
            DetectorKind::IsolationForest => Box::new(IsolationForest::new(
                self.n_trees,
                self.max_samples,
                self.min_samples,
            )),
            DetectorKind::ZScore => Box::new(ZScoreThreshold {
                k: self.zscore_k,
                min_samples: self.min_samples,
            }),
        }
    }

    pub fn scorer(&self) -> AnomalyScorer {
        AnomalyScorer::new(self.detector(), self.outlier_fraction, self.seed)
    }
}

impl LiqwatchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() {
            return Err(ConfigError::Invalid("universe must list at least one ticker".into()));
        }
        if let Some(bad) = self.universe.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank ticker in universe: {bad:?}")));
        }
        if self.features.window < MIN_WINDOW {
            return Err(ConfigError::Invalid(format!(
                "features.window must be at least {MIN_WINDOW}, got {}",
                self.features.window
            )));
        }
        let fraction = self.anomaly.outlier_fraction;
        if !(fraction > 0.0 && fraction <= 0.5) {
            return Err(ConfigError::Invalid(format!(
                "anomaly.outlier_fraction must be in (0, 0.5], got {fraction}"
            )));
        }
        if self.anomaly.n_trees == 0 {
            return Err(ConfigError::Invalid("anomaly.n_trees must be positive".into()));
        }
        Ok(())
    }

    /// Resolve a config the way the binaries do.
    ///
    /// An explicit path must exist. The implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }

        let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), default_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::from_file(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }
}

/// `{config_dir}/liqwatch/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("liqwatch").join("config.toml"))
}
