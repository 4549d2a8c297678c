//! Bar — one trading day for one ticker, as reported by the market data source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar.
///
/// `adj_close` is the price series every liquidity feature is computed from.
/// Raw OHLC is retained for display and export only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl Bar {
    /// True when the adjusted close can anchor a return: finite and positive.
    pub fn is_usable(&self) -> bool {
        self.adj_close.is_finite() && self.adj_close > 0.0
    }
}
