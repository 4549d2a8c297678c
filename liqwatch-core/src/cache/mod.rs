//! Feature cache: ticker → last computed [`FeatureTable`].
//!
//! Presence of an entry means it is fresh; there is no TTL. Entries are
//! replaced whole on store and removed on invalidate, never patched.

mod memory;
mod parquet;

pub use memory::MemoryFeatureCache;
pub use parquet::ParquetFeatureCache;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::FeatureTable;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("corrupt cache entry for {ticker}: {reason}")]
    Corrupt { ticker: String, reason: String },

    #[error("cache metadata error: {0}")]
    Metadata(String),

    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Sidecar summary of one cached table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub ticker: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: usize,
    pub anomaly_count: usize,
    pub data_hash: String,
    pub cached_at: NaiveDateTime,
}

impl CacheMeta {
    pub fn for_table(table: &FeatureTable) -> Self {
        Self {
            ticker: table.ticker.clone(),
            start_date: table.first_date(),
            end_date: table.last_date(),
            row_count: table.len(),
            anomaly_count: table.anomaly_count(),
            data_hash: table.content_hash(),
            cached_at: chrono::Local::now().naive_local(),
        }
    }
}

/// Per-ticker line for `cache status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub ticker: String,
    pub cached: bool,
    pub meta: Option<CacheMeta>,
}

/// Persistent store of feature tables.
pub trait FeatureCache: Send + Sync {
    fn name(&self) -> &str;

    /// Last stored table, or `None` if absent. Never returns a partial table.
    fn load(&self, ticker: &str) -> Result<Option<FeatureTable>, CacheError>;

    /// Replace the entry for `ticker` atomically.
    fn store(&self, ticker: &str, table: &FeatureTable) -> Result<(), CacheError>;

    /// Remove the entry. Absent is not an error.
    fn invalidate(&self, ticker: &str) -> Result<(), CacheError>;

    /// Metadata for every stored entry, sorted by ticker.
    fn entries(&self) -> Result<Vec<CacheMeta>, CacheError>;

    fn status(&self, tickers: &[String]) -> Result<Vec<CacheStatus>, CacheError> {
        let entries = self.entries()?;
        Ok(tickers
            .iter()
            .map(|t| {
                let meta = entries.iter().find(|m| &m.ticker == t).cloned();
                CacheStatus {
                    ticker: t.clone(),
                    cached: meta.is_some(),
                    meta,
                }
            })
            .collect())
    }

    /// Release resources at the end of a batch run.
    fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Reject keys that could escape the cache directory.
pub(crate) fn validate_key(ticker: &str) -> Result<(), CacheError> {
    let bad = ticker.is_empty()
        || ticker.contains('/')
        || ticker.contains('\\')
        || ticker.contains("..")
        || ticker.chars().any(char::is_control);
    if bad {
        return Err(CacheError::InvalidKey(ticker.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("AAPL").is_ok());
        assert!(validate_key("BRK-B").is_ok());
        assert!(validate_key("^GSPC").is_ok());
        for bad in ["", "../etc", "a/b", "a\\b", "x\n"] {
            assert!(
                matches!(validate_key(bad), Err(CacheError::InvalidKey(_))),
                "{bad:?} accepted"
            );
        }
    }
}
