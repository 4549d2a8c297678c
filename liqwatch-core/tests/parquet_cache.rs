//! Parquet feature cache against a real directory.

use chrono::{Duration, NaiveDate};
use std::fs;

use liqwatch_core::anomaly::AnomalyScorer;
use liqwatch_core::cache::{CacheError, FeatureCache, ParquetFeatureCache};
use liqwatch_core::features::{compute_features, DEFAULT_WINDOW};
use liqwatch_core::{Bar, FeatureTable};

fn sample_table(ticker: &str, n: usize) -> FeatureTable {
    let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let bars: Vec<Bar> = (0..n)
        .map(|i| {
            let p = 100.0 + (i as f64 * 0.3).cos() * 4.0;
            Bar {
                date: start + Duration::days(i as i64),
                open: p - 0.5,
                high: p + 1.0,
                low: p - 1.0,
                close: p,
                adj_close: p * 0.99,
                volume: 2_000_000 + (i as u64 * 7_919) % 300_000,
            }
        })
        .collect();
    let mut table = compute_features(ticker, &bars, DEFAULT_WINDOW);
    AnomalyScorer::isolation_forest().apply(&mut table).unwrap();
    table
}

#[test]
fn round_trip_preserves_every_column() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    let table = sample_table("AAPL", 126);

    cache.store("AAPL", &table).unwrap();
    let loaded = cache.load("AAPL").unwrap().expect("entry present");

    assert_eq!(loaded, table);
    assert_eq!(loaded.content_hash(), table.content_hash());
}

#[test]
fn store_replaces_whole_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());

    cache.store("MSFT", &sample_table("MSFT", 80)).unwrap();
    let shorter = sample_table("MSFT", 30);
    cache.store("MSFT", &shorter).unwrap();

    assert_eq!(cache.load("MSFT").unwrap().unwrap(), shorter);
}

#[test]
fn invalidate_removes_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    cache.store("TSLA", &sample_table("TSLA", 40)).unwrap();

    cache.invalidate("TSLA").unwrap();
    assert!(cache.load("TSLA").unwrap().is_none());
    assert!(!dir.path().join("ticker=TSLA").exists());

    cache.invalidate("TSLA").unwrap();
    cache.invalidate("NEVER").unwrap();
}

#[test]
fn corrupt_file_is_an_error_not_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    cache.store("GOOGL", &sample_table("GOOGL", 40)).unwrap();

    fs::write(
        dir.path().join("ticker=GOOGL").join("features.parquet"),
        b"definitely not parquet",
    )
    .unwrap();

    assert!(matches!(
        cache.load("GOOGL"),
        Err(CacheError::Corrupt { ref ticker, .. }) if ticker == "GOOGL"
    ));
}

#[test]
fn path_like_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    let table = sample_table("X", 5);

    assert!(matches!(
        cache.store("../escape", &table),
        Err(CacheError::InvalidKey(_))
    ));
    assert!(matches!(cache.load("a/b"), Err(CacheError::InvalidKey(_))));
    assert!(matches!(cache.invalidate(".."), Err(CacheError::InvalidKey(_))));
}

#[test]
fn entries_and_status_read_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    let aapl = sample_table("AAPL", 50);
    cache.store("AAPL", &aapl).unwrap();
    cache.store("AMZN", &sample_table("AMZN", 25)).unwrap();

    let entries = cache.entries().unwrap();
    let tickers: Vec<&str> = entries.iter().map(|m| m.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "AMZN"]);
    assert_eq!(entries[0].row_count, 50);
    assert_eq!(entries[0].anomaly_count, aapl.anomaly_count());
    assert_eq!(entries[0].start_date, aapl.first_date());
    assert_eq!(entries[0].data_hash, aapl.content_hash());

    // A missing sidecar is rebuilt from the table.
    fs::remove_file(dir.path().join("ticker=AMZN").join("meta.json")).unwrap();
    let status = cache
        .status(&["AMZN".to_string(), "TSLA".to_string()])
        .unwrap();
    assert!(status[0].cached);
    assert_eq!(status[0].meta.as_ref().map(|m| m.row_count), Some(25));
    assert!(!status[1].cached);
}

#[test]
fn missing_cache_dir_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path().join("not-created-yet"));
    assert!(cache.entries().unwrap().is_empty());
    cache.close().unwrap();
}

#[test]
fn close_sweeps_stale_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    cache.store("SPY", &sample_table("SPY", 30)).unwrap();
    let stale = dir.path().join("ticker=SPY").join("features.parquet.tmp");
    fs::write(&stale, b"partial").unwrap();

    cache.close().unwrap();

    assert!(!stale.exists());
    assert!(cache.load("SPY").unwrap().is_some());
}

#[test]
fn concurrent_stores_leave_a_complete_table() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetFeatureCache::new(dir.path());
    let tables: Vec<FeatureTable> = (0..4).map(|i| sample_table("QQQ", 30 + i * 10)).collect();

    std::thread::scope(|s| {
        for table in &tables {
            let cache = &cache;
            s.spawn(move || cache.store("QQQ", table).unwrap());
        }
    });

    let loaded = cache.load("QQQ").unwrap().unwrap();
    assert!(tables.contains(&loaded));
}
