//! Market data source trait and its error taxonomy.
//!
//! The `MarketDataSource` trait abstracts the bar provider (Yahoo Finance in
//! production, canned bars in tests). The feature cache sits above this
//! trait; sources never see the cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Bar;

/// Errors from a market data source.
///
/// `NoData` is definitive and never retried. Everything else describes a
/// transport or provider failure a caller may retry later.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no market data for ticker '{ticker}'")]
    NoData { ticker: String },

    #[error("market data source unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("hard stop: provider is refusing requests (circuit breaker open)")]
    CircuitOpen,

    #[error("response format changed: {0}")]
    ResponseFormat(String),
}

impl SourceError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, SourceError::NoData { .. })
    }

    /// Provider-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }

    /// Whether an immediate retry inside the source makes sense.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Unavailable(_) | SourceError::RateLimited { .. }
        )
    }
}

/// How far back to fetch, expressed the way the provider's `range` parameter does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lookback {
    Months(u32),
    Years(u32),
}

impl Lookback {
    /// Six months of daily history.
    pub const SIX_MONTHS: Lookback = Lookback::Months(6);

    /// Approximate length in calendar days.
    pub fn approx_days(self) -> i64 {
        match self {
            Lookback::Months(m) => i64::from(m) * 31,
            Lookback::Years(y) => i64::from(y) * 366,
        }
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::SIX_MONTHS
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Months(m) => write!(f, "{m}mo"),
            Lookback::Years(y) => write!(f, "{y}y"),
        }
    }
}

impl FromStr for Lookback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()));
        let n: u32 = digits
            .parse()
            .map_err(|_| format!("invalid lookback '{s}': expected e.g. 6mo or 1y"))?;
        if n == 0 {
            return Err(format!("invalid lookback '{s}': must be positive"));
        }
        match unit {
            "mo" => Ok(Lookback::Months(n)),
            "y" => Ok(Lookback::Years(n)),
            _ => Err(format!("invalid lookback unit in '{s}': expected 'mo' or 'y'")),
        }
    }
}

impl TryFrom<String> for Lookback {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lookback> for String {
    fn from(value: Lookback) -> Self {
        value.to_string()
    }
}

/// Bar interval. Only daily bars feed the liquidity pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "1d",
        }
    }
}

/// A provider of daily bars.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch bars for `ticker` covering the trailing `lookback`, oldest first.
    ///
    /// Returns `SourceError::NoData` when the ticker is unknown or has no bars
    /// in range.
    fn fetch_daily_bars(
        &self,
        ticker: &str,
        lookback: Lookback,
        interval: Interval,
    ) -> Result<Vec<Bar>, SourceError>;

    /// Whether the source currently accepts requests.
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_parses_provider_ranges() {
        assert_eq!("6mo".parse::<Lookback>().unwrap(), Lookback::Months(6));
        assert_eq!("2y".parse::<Lookback>().unwrap(), Lookback::Years(2));
        assert_eq!(Lookback::Months(6).to_string(), "6mo");
    }

    #[test]
    fn lookback_rejects_garbage() {
        assert!("".parse::<Lookback>().is_err());
        assert!("0mo".parse::<Lookback>().is_err());
        assert!("6 weeks".parse::<Lookback>().is_err());
        assert!("mo".parse::<Lookback>().is_err());
    }

    #[test]
    fn error_classification() {
        let no_data = SourceError::NoData {
            ticker: "FAKE".into(),
        };
        assert!(no_data.is_no_data());
        assert!(!no_data.is_transient());
        assert!(SourceError::Unavailable("timeout".into()).is_transient());
        assert!(!SourceError::CircuitOpen.is_transient());
        assert_eq!(
            SourceError::RateLimited { retry_after_secs: 7 }.retry_after(),
            Some(Duration::from_secs(7))
        );
        assert_eq!(SourceError::CircuitOpen.retry_after(), None);
    }
}
