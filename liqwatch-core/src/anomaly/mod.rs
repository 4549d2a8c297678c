//! Anomaly scoring on the illiquidity series.
//!
//! Detectors implement [`AnomalyDetector`]: one batch call that fits on the
//! whole series and labels every element. Nothing is persisted between calls.
//! [`AnomalyScorer`] binds a detector to a fixed outlier fraction and seed and
//! turns a too-short series into an all-inlier result.

mod isolation_forest;
mod zscore;

pub use isolation_forest::IsolationForest;
pub use zscore::ZScoreThreshold;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::FeatureTable;

/// Below this many rows a detector refuses to score.
pub const DEFAULT_MIN_SAMPLES: usize = 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnomalyError {
    #[error("series too short for anomaly scoring: {len} rows (minimum {min})")]
    Degenerate { len: usize, min: usize },

    #[error("outlier fraction must be in (0, 0.5], got {0}")]
    InvalidFraction(f64),
}

/// An unsupervised univariate outlier detector.
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Fit on `series` and return one flag per element (`true` = outlier).
    ///
    /// Must be deterministic for a fixed `series` and `seed`.
    fn fit_and_score(
        &self,
        series: &[f64],
        outlier_fraction: f64,
        seed: u64,
    ) -> Result<Vec<bool>, AnomalyError>;
}

/// Which detector the scorer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    #[default]
    IsolationForest,
    ZScore,
}

/// Shared argument checks for detectors.
pub(crate) fn check_input(
    series: &[f64],
    outlier_fraction: f64,
    min_samples: usize,
) -> Result<(), AnomalyError> {
    if !(outlier_fraction > 0.0 && outlier_fraction <= 0.5) {
        return Err(AnomalyError::InvalidFraction(outlier_fraction));
    }
    if series.len() < min_samples.max(2) {
        return Err(AnomalyError::Degenerate {
            len: series.len(),
            min: min_samples.max(2),
        });
    }
    Ok(())
}

/// Non-finite inputs are scored as zero.
pub(crate) fn sanitize(series: &[f64]) -> Vec<f64> {
    series
        .iter()
        .map(|&x| if x.is_finite() { x } else { 0.0 })
        .collect()
}

/// Detector plus its fixed calibration.
pub struct AnomalyScorer {
    detector: Box<dyn AnomalyDetector>,
    outlier_fraction: f64,
    seed: u64,
}

impl AnomalyScorer {
    pub fn new(detector: Box<dyn AnomalyDetector>, outlier_fraction: f64, seed: u64) -> Self {
        Self {
            detector,
            outlier_fraction,
            seed,
        }
    }

    /// Isolation forest, 5% outliers, seed 42.
    pub fn isolation_forest() -> Self {
        Self::new(Box::new(IsolationForest::default()), 0.05, 42)
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn outlier_fraction(&self) -> f64 {
        self.outlier_fraction
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Label `illiquidity`. A series too short to score comes back all `false`.
    pub fn score(&self, illiquidity: &[f64]) -> Result<Vec<bool>, AnomalyError> {
        match self
            .detector
            .fit_and_score(illiquidity, self.outlier_fraction, self.seed)
        {
            Ok(flags) => Ok(flags),
            Err(AnomalyError::Degenerate { len, min }) => {
                tracing::debug!(
                    len,
                    min,
                    detector = self.detector.name(),
                    "series below minimum sample count, no anomalies flagged"
                );
                Ok(vec![false; illiquidity.len()])
            }
            Err(e) => Err(e),
        }
    }

    /// Score the table's illiquidity column and write the flags back.
    pub fn apply(&self, table: &mut FeatureTable) -> Result<(), AnomalyError> {
        let flags = self.score(&table.illiquidity())?;
        table.set_anomalies(&flags);
        Ok(())
    }
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::isolation_forest()
    }
}
