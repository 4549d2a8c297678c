//! FeatureRow / FeatureTable — bars enriched with liquidity features and anomaly flags.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Bar;

/// One bar plus its derived liquidity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub bar: Bar,
    /// Simple return of `adj_close` vs the previous row. `0.0` on the first row.
    pub ret: f64,
    /// Amihud ratio `|ret| / volume`, clamped to `0.0` when undefined.
    pub illiquidity: f64,
    /// Trailing z-score of `illiquidity`.
    pub z_score: f64,
    /// Outlier label from the anomaly scorer.
    pub anomaly: bool,
}

impl FeatureRow {
    pub fn date(&self) -> NaiveDate {
        self.bar.date
    }
}

/// The full, date-ascending feature set for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub ticker: String,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(ticker: impl Into<String>, rows: Vec<FeatureRow>) -> Self {
        Self {
            ticker: ticker.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(FeatureRow::date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(FeatureRow::date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(FeatureRow::date).collect()
    }

    /// The illiquidity column, the only input the anomaly scorer sees.
    pub fn illiquidity(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.illiquidity).collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.rows.iter().filter(|r| r.anomaly).count()
    }

    /// Overwrite the anomaly column. `flags` must have one entry per row.
    pub fn set_anomalies(&mut self, flags: &[bool]) {
        debug_assert_eq!(flags.len(), self.rows.len());
        for (row, &flag) in self.rows.iter_mut().zip(flags) {
            row.anomaly = flag;
        }
    }

    /// BLAKE3 hash over every persisted column, in row order.
    ///
    /// Two tables with the same hash are bit-identical.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.ticker.as_bytes());
        for row in &self.rows {
            hasher.update(row.bar.date.to_string().as_bytes());
            hasher.update(&row.bar.open.to_le_bytes());
            hasher.update(&row.bar.high.to_le_bytes());
            hasher.update(&row.bar.low.to_le_bytes());
            hasher.update(&row.bar.close.to_le_bytes());
            hasher.update(&row.bar.adj_close.to_le_bytes());
            hasher.update(&row.bar.volume.to_le_bytes());
            hasher.update(&row.ret.to_le_bytes());
            hasher.update(&row.illiquidity.to_le_bytes());
            hasher.update(&row.z_score.to_le_bytes());
            hasher.update(&[row.anomaly as u8]);
        }
        hasher.finalize().to_hex().to_string()
    }
}
