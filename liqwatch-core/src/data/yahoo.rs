//! Yahoo Finance market data source.
//!
//! Fetches daily bars from Yahoo's v8 chart API using its `range` parameter
//! (`6mo`, `1y`, ...). Transient failures are retried with exponential
//! backoff; "not found" is definitive and returned at once. A shared
//! circuit breaker stops all traffic after a ban or repeated rate limiting.
//!
//! Yahoo has no official API and changes its response shape without notice,
//! so parsing is defensive and failures surface as `ResponseFormat`.

use super::circuit_breaker::CircuitBreaker;
use super::source::{Interval, Lookback, MarketDataSource, SourceError};
use crate::domain::Bar;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Retry behaviour for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound on any single wait, including a provider `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based).
    ///
    /// Exponential backoff, stretched to the provider's `Retry-After` when
    /// that is longer, and capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        backoff
            .max(retry_after.unwrap_or(Duration::ZERO))
            .min(self.max_delay)
    }
}

/// Yahoo Finance source.
pub struct YahooSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    base_url: String,
}

impl YahooSource {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            retry,
            base_url: "https://query2.finance.yahoo.com".to_string(),
        })
    }

    fn chart_url(&self, ticker: &str, lookback: Lookback, interval: Interval) -> String {
        format!(
            "{}/v8/finance/chart/{ticker}?range={lookback}&interval={}&includeAdjustedClose=true",
            self.base_url,
            interval.as_str()
        )
    }

    /// Turn a chart response into bars, oldest first.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<Bar>, SourceError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => {
                return Err(SourceError::NoData {
                    ticker: ticker.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(SourceError::ResponseFormat(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(SourceError::ResponseFormat(
                    "empty result with no error".into(),
                ))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Err(SourceError::NoData {
                ticker: ticker.to_string(),
            });
        };

        // A valid ticker with nothing in range comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Err(SourceError::NoData {
                ticker: ticker.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::ResponseFormat("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| SourceError::ResponseFormat(format!("invalid timestamp: {ts}")))?;

            let field = |v: &[Option<f64>]| v.get(i).copied().flatten();
            let close = field(&quote.close);
            let adj_close = adj_closes
                .as_deref()
                .and_then(|v| v.get(i).copied().flatten())
                .or(close);

            // Any missing field drops the whole day; gaps are never filled in.
            let (Some(open), Some(high), Some(low), Some(close), Some(adj_close), Some(volume)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                close,
                adj_close,
                quote.volume.get(i).copied().flatten(),
            ) else {
                skipped += 1;
                continue;
            };

            bars.push(Bar {
                date,
                open,
                high,
                low,
                close,
                adj_close,
                volume,
            });
        }

        if skipped > 0 {
            tracing::debug!(ticker, skipped, "dropped incomplete provider rows");
        }

        if bars.is_empty() {
            return Err(SourceError::NoData {
                ticker: ticker.to_string(),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        ticker: &str,
        lookback: Lookback,
        interval: Interval,
    ) -> Result<Vec<Bar>, SourceError> {
        let url = self.chart_url(ticker, lookback, interval);
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let retry_after = last_error.as_ref().and_then(SourceError::retry_after);
                let delay = self.retry.delay_for(attempt, retry_after);
                tracing::warn!(
                    ticker,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying market data request"
                );
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(SourceError::CircuitOpen);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(SourceError::Unavailable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(SourceError::Unavailable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(SourceError::CircuitOpen);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                self.circuit_breaker.record_success();
                return Err(SourceError::NoData {
                    ticker: ticker.to_string(),
                });
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(SourceError::RateLimited { retry_after_secs });
                continue;
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(SourceError::Unavailable(format!("HTTP {status} for {ticker}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                SourceError::ResponseFormat(format!("failed to parse response for {ticker}: {e}"))
            })?;

            self.circuit_breaker.record_success();
            return Self::parse_response(ticker, chart);
        }

        Err(last_error.unwrap_or_else(|| SourceError::Unavailable("max retries exceeded".into())))
    }
}

impl MarketDataSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_daily_bars(
        &self,
        ticker: &str,
        lookback: Lookback,
        interval: Interval,
    ) -> Result<Vec<Bar>, SourceError> {
        let bars = self.fetch_with_retry(ticker, lookback, interval)?;
        tracing::debug!(ticker, bars = bars.len(), %lookback, "fetched daily bars");
        Ok(bars)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
