//! Pipeline orchestrator: read-through cache over fetch → features → scoring.
//!
//! Every call runs to completion on the caller's thread. The only shared
//! state is the cache; the universe and cache handle come in through the
//! constructor.

use std::sync::Arc;
use thiserror::Error;

use crate::anomaly::{AnomalyError, AnomalyScorer};
use crate::cache::{CacheError, FeatureCache, MemoryFeatureCache, ParquetFeatureCache};
use crate::config::LiqwatchConfig;
use crate::data::{
    canonicalize, CircuitBreaker, Interval, Lookback, MarketDataSource, SourceError, YahooSource,
};
use crate::domain::FeatureTable;
use crate::features::{compute_features, DEFAULT_WINDOW, MIN_WINDOW};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no market data for {ticker}")]
    NoData { ticker: String },

    #[error("market data unavailable for {ticker}: {source}")]
    SourceUnavailable {
        ticker: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("anomaly scoring failed: {0}")]
    Scoring(#[from] AnomalyError),

    #[error("invalid ticker {0:?}")]
    InvalidTicker(String),

    #[error("pipeline setup failed: {0}")]
    Setup(String),
}

impl PipelineError {
    fn from_source(ticker: &str, err: SourceError) -> Self {
        match err {
            SourceError::NoData { .. } => PipelineError::NoData {
                ticker: ticker.to_string(),
            },
            other => PipelineError::SourceUnavailable {
                ticker: ticker.to_string(),
                source: other,
            },
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::SourceUnavailable { .. })
    }
}

/// Per-run knobs that are not part of the collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub lookback: Lookback,
    pub window: usize,
    pub universe: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lookback: Lookback::SIX_MONTHS,
            window: DEFAULT_WINDOW,
            universe: Vec::new(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &LiqwatchConfig) -> Self {
        Self {
            lookback: config.source.lookback,
            window: config.features.window,
            universe: config.universe.clone(),
        }
    }
}

/// Progress callbacks for a universe refresh.
pub trait RefreshProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: &Result<(), PipelineError>,
    );

    fn on_batch_complete(&self, summary: &RefreshSummary);
}

/// Progress reporter that only logs.
pub struct LogProgress;

impl RefreshProgress for LogProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        tracing::info!(ticker, "[{}/{total}] refreshing", index + 1);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), PipelineError>,
    ) {
        match result {
            Ok(()) => tracing::info!(ticker, "refreshed"),
            Err(e) => tracing::warn!(ticker, error = %e, "refresh failed"),
        }
    }

    fn on_batch_complete(&self, summary: &RefreshSummary) {
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "universe refresh finished"
        );
    }
}

/// Outcome of [`LiquidityPipeline::refresh_universe`].
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

impl RefreshSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct LiquidityPipeline {
    source: Box<dyn MarketDataSource>,
    cache: Box<dyn FeatureCache>,
    scorer: AnomalyScorer,
    settings: PipelineSettings,
}

impl LiquidityPipeline {
    /// Wire the collaborators. A rolling window below 2 is raised to 2.
    pub fn new(
        source: Box<dyn MarketDataSource>,
        cache: Box<dyn FeatureCache>,
        scorer: AnomalyScorer,
        mut settings: PipelineSettings,
    ) -> Self {
        if settings.window < MIN_WINDOW {
            tracing::warn!(
                window = settings.window,
                min = MIN_WINDOW,
                "rolling window too small, clamping"
            );
            settings.window = MIN_WINDOW;
        }
        Self {
            source,
            cache,
            scorer,
            settings,
        }
    }

    /// Production wiring: Yahoo source, Parquet cache under `config.cache.dir`.
    pub fn from_config(config: &LiqwatchConfig) -> Result<Self, PipelineError> {
        let cache = ParquetFeatureCache::new(&config.cache.dir);
        Self::from_config_with_cache(config, Box::new(cache))
    }

    /// Like [`from_config`](Self::from_config) but nothing touches the disk.
    pub fn from_config_in_memory(config: &LiqwatchConfig) -> Result<Self, PipelineError> {
        Self::from_config_with_cache(config, Box::new(MemoryFeatureCache::new()))
    }

    fn from_config_with_cache(
        config: &LiqwatchConfig,
        cache: Box<dyn FeatureCache>,
    ) -> Result<Self, PipelineError> {
        config
            .validate()
            .map_err(|e| PipelineError::Setup(e.to_string()))?;
        let breaker = Arc::new(CircuitBreaker::new(
            config.source.breaker_cooldown(),
            config.source.breaker_failure_threshold,
        ));
        let source = YahooSource::new(
            breaker,
            config.source.timeout(),
            config.source.retry_policy(),
        )
        .map_err(|e| PipelineError::Setup(e.to_string()))?;

        Ok(Self::new(
            Box::new(source),
            cache,
            config.anomaly.scorer(),
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn universe(&self) -> &[String] {
        &self.settings.universe
    }

    pub fn cache(&self) -> &dyn FeatureCache {
        self.cache.as_ref()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Cached table for `ticker`, computing and storing it on a miss.
    pub fn get_or_compute(&self, ticker: &str) -> Result<FeatureTable, PipelineError> {
        let ticker = normalize_ticker(ticker)?;
        if let Some(table) = self.cache.load(&ticker)? {
            tracing::debug!(ticker = %ticker, rows = table.len(), "serving cached features");
            return Ok(table);
        }
        self.compute_and_store(&ticker)
    }

    /// Drop the cached entry and recompute from fresh data.
    ///
    /// The entry stays absent if the fetch fails.
    pub fn force_refresh(&self, ticker: &str) -> Result<(), PipelineError> {
        let ticker = normalize_ticker(ticker)?;
        self.cache.invalidate(&ticker)?;
        self.compute_and_store(&ticker).map(|_| ())
    }

    /// Force-refresh every ticker in the universe, isolating failures.
    ///
    /// Every ticker goes through [`force_refresh`](Self::force_refresh), so
    /// its old entry is dropped even when the source is down; an open breaker
    /// fails each remaining fetch fast with `CircuitOpen`.
    pub fn refresh_universe(&self, progress: &dyn RefreshProgress) -> RefreshSummary {
        let tickers = &self.settings.universe;
        let total = tickers.len();
        let mut summary = RefreshSummary {
            total,
            ..RefreshSummary::default()
        };

        let mut warned = false;
        for (i, ticker) in tickers.iter().enumerate() {
            progress.on_start(ticker, i, total);
            let result = self.force_refresh(ticker);
            progress.on_complete(ticker, i, total, &result);

            match result {
                Ok(()) => summary.succeeded.push(ticker.clone()),
                Err(e) => summary.failed.push((ticker.clone(), e)),
            }

            if !warned && i + 1 < total && !self.source.is_available() {
                tracing::warn!(
                    remaining = total - i - 1,
                    "market data source unavailable, remaining tickers will fail fast"
                );
                warned = true;
            }
        }

        progress.on_batch_complete(&summary);
        summary
    }

    /// End-of-run teardown.
    pub fn close(&self) -> Result<(), PipelineError> {
        self.cache.close()?;
        Ok(())
    }

    fn compute_and_store(&self, ticker: &str) -> Result<FeatureTable, PipelineError> {
        let raw = self
            .source
            .fetch_daily_bars(ticker, self.settings.lookback, Interval::Daily)
            .map_err(|e| PipelineError::from_source(ticker, e))?;

        let report = canonicalize(raw);
        if report.dropped() > 0 {
            tracing::warn!(
                ticker,
                unusable = report.dropped_unusable,
                duplicates = report.dropped_duplicates,
                "dropped bars during ingest"
            );
        }
        if report.bars.is_empty() {
            return Err(PipelineError::NoData {
                ticker: ticker.to_string(),
            });
        }

        let mut table = compute_features(ticker, &report.bars, self.settings.window);
        self.scorer.apply(&mut table)?;
        self.cache.store(ticker, &table)?;

        tracing::info!(
            ticker,
            rows = table.len(),
            anomalies = table.anomaly_count(),
            detector = self.scorer.detector_name(),
            "computed liquidity features"
        );
        Ok(table)
    }
}

/// Trimmed, upper-cased ticker. Blank input is rejected.
pub fn normalize_ticker(ticker: &str) -> Result<String, PipelineError> {
    let t = ticker.trim();
    if t.is_empty() || t.chars().any(char::is_whitespace) {
        return Err(PipelineError::InvalidTicker(ticker.to_string()));
    }
    Ok(t.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_normalization() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_ticker("brk-b").unwrap(), "BRK-B");
        assert!(normalize_ticker("").is_err());
        assert!(normalize_ticker("A B").is_err());
    }

    #[test]
    fn no_data_source_error_maps_to_no_data() {
        let err = PipelineError::from_source(
            "FAKE",
            SourceError::NoData {
                ticker: "FAKE".into(),
            },
        );
        assert!(matches!(err, PipelineError::NoData { .. }));
        assert!(!err.is_recoverable());

        let err = PipelineError::from_source("X", SourceError::CircuitOpen);
        assert!(err.is_recoverable());
    }
}
