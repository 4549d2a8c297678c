//! LiqWatch Core — daily market data in, liquidity features and anomaly flags out.
//!
//! - Market data source trait with a Yahoo Finance provider and circuit breaker
//! - Amihud illiquidity and its trailing z-score
//! - Isolation-forest (or z-score) anomaly scoring on the illiquidity series
//! - Read-through feature cache (Parquet on disk, or in memory)
//! - `LiquidityPipeline` orchestrating all of the above
//! - TOML configuration and presentation helpers for the binaries

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod features;
pub mod pipeline;
pub mod seed;
pub mod view;

pub use config::LiqwatchConfig;
pub use domain::{Bar, FeatureRow, FeatureTable};
pub use pipeline::{LiquidityPipeline, PipelineError, PipelineSettings, RefreshSummary};
