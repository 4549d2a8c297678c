//! Market data: source trait, Yahoo Finance provider, circuit breaker, bar cleanup.

pub mod circuit_breaker;
pub mod ingest;
pub mod source;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use ingest::{canonicalize, IngestReport};
pub use source::{Interval, Lookback, MarketDataSource, SourceError};
pub use yahoo::{RetryPolicy, YahooSource};
