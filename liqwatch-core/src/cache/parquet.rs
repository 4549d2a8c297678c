//! Parquet-backed feature cache.
//!
//! Layout: `{cache_dir}/ticker={TICKER}/features.parquet` plus a `meta.json`
//! sidecar. Writes go to `*.tmp` and are renamed into place, so a reader
//! sees either the old table or the new one. Writers for the same ticker are
//! serialized by an in-process lock.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{validate_key, CacheError, CacheMeta, FeatureCache};
use crate::domain::{Bar, FeatureRow, FeatureTable};

const TABLE_FILE: &str = "features.parquet";
const META_FILE: &str = "meta.json";

const COLUMNS: [&str; 11] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
    "ret",
    "illiquidity",
    "z_score",
    "anomaly",
];

pub struct ParquetFeatureCache {
    cache_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ParquetFeatureCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.cache_dir.join(format!("ticker={ticker}"))
    }

    fn table_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join(TABLE_FILE)
    }

    fn meta_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join(META_FILE)
    }

    fn ticker_lock(&self, ticker: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(ticker.to_string()).or_default())
    }

    fn read_meta(&self, ticker: &str) -> Result<CacheMeta, CacheError> {
        let path = self.meta_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| CacheError::io(&path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| CacheError::Metadata(format!("{}: {e}", path.display())))
    }

    /// Tickers with a table file on disk.
    fn cached_tickers(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.cache_dir, e)),
        };

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.cache_dir, e))?;
            let name = entry.file_name();
            let Some(ticker) = name.to_str().and_then(|n| n.strip_prefix("ticker=")) else {
                continue;
            };
            if entry.path().join(TABLE_FILE).is_file() {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

impl FeatureCache for ParquetFeatureCache {
    fn name(&self) -> &str {
        "parquet"
    }

    fn load(&self, ticker: &str) -> Result<Option<FeatureTable>, CacheError> {
        validate_key(ticker)?;
        let path = self.table_path(ticker);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| CacheError::Corrupt {
                ticker: ticker.to_string(),
                reason: format!("unreadable parquet: {e}"),
            })?;
        let rows = dataframe_to_rows(&df).map_err(|reason| CacheError::Corrupt {
            ticker: ticker.to_string(),
            reason,
        })?;

        tracing::debug!(ticker, rows = rows.len(), "feature cache hit");
        Ok(Some(FeatureTable::new(ticker, rows)))
    }

    fn store(&self, ticker: &str, table: &FeatureTable) -> Result<(), CacheError> {
        validate_key(ticker)?;
        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.ticker_dir(ticker);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let mut df = rows_to_dataframe(&table.rows)?;
        let path = self.table_path(ticker);
        let tmp_path = path.with_extension("parquet.tmp");
        let file = fs::File::create(&tmp_path).map_err(|e| CacheError::io(&tmp_path, e))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| CacheError::Parquet(format!("write {}: {e}", tmp_path.display())))?;
        replace(&tmp_path, &path)?;

        let meta = CacheMeta::for_table(table);
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| CacheError::Metadata(e.to_string()))?;
        let meta_path = self.meta_path(ticker);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json).map_err(|e| CacheError::io(&meta_tmp, e))?;
        replace(&meta_tmp, &meta_path)?;

        tracing::info!(
            ticker,
            rows = table.len(),
            anomalies = meta.anomaly_count,
            "stored feature table"
        );
        Ok(())
    }

    fn invalidate(&self, ticker: &str) -> Result<(), CacheError> {
        validate_key(ticker)?;
        let lock = self.ticker_lock(ticker);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.ticker_dir(ticker);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(ticker, "invalidated cache entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&dir, e)),
        }
    }

    fn entries(&self) -> Result<Vec<CacheMeta>, CacheError> {
        let mut metas = Vec::new();
        for ticker in self.cached_tickers()? {
            match self.read_meta(&ticker) {
                Ok(meta) => metas.push(meta),
                Err(e) => {
                    // The sidecar is informational; rebuild it from the table.
                    tracing::warn!(ticker = %ticker, error = %e, "missing or bad cache sidecar");
                    if let Some(table) = self.load(&ticker)? {
                        metas.push(CacheMeta::for_table(&table));
                    }
                }
            }
        }
        Ok(metas)
    }

    /// Sweep temp files left behind by interrupted writes.
    fn close(&self) -> Result<(), CacheError> {
        let mut removed = 0usize;
        for ticker in self.cached_tickers()? {
            let dir = self.ticker_dir(&ticker);
            let entries = fs::read_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                    fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                    removed += 1;
                }
            }
        }
        tracing::debug!(removed, "feature cache closed");
        Ok(())
    }
}

fn replace(tmp_path: &Path, path: &Path) -> Result<(), CacheError> {
    fs::rename(tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        CacheError::io(path, e)
    })
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn rows_to_dataframe(rows: &[FeatureRow]) -> Result<DataFrame, CacheError> {
    let days: Vec<i32> = rows
        .iter()
        .map(|r| (r.bar.date - epoch()).num_days() as i32)
        .collect();
    let col_f64 = |f: fn(&FeatureRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();

    DataFrame::new(vec![
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| CacheError::Parquet(format!("date cast: {e}")))?,
        Column::new("open".into(), col_f64(|r| r.bar.open)),
        Column::new("high".into(), col_f64(|r| r.bar.high)),
        Column::new("low".into(), col_f64(|r| r.bar.low)),
        Column::new("close".into(), col_f64(|r| r.bar.close)),
        Column::new("adj_close".into(), col_f64(|r| r.bar.adj_close)),
        Column::new(
            "volume".into(),
            rows.iter().map(|r| r.bar.volume).collect::<Vec<u64>>(),
        ),
        Column::new("ret".into(), col_f64(|r| r.ret)),
        Column::new("illiquidity".into(), col_f64(|r| r.illiquidity)),
        Column::new("z_score".into(), col_f64(|r| r.z_score)),
        Column::new(
            "anomaly".into(),
            rows.iter().map(|r| r.anomaly).collect::<Vec<bool>>(),
        ),
    ])
    .map_err(|e| CacheError::Parquet(format!("dataframe creation: {e}")))
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, String> {
    let ca = df
        .column(name)
        .map_err(|e| e.to_string())?
        .f64()
        .map_err(|e| format!("{name}: {e}"))?;
    Ok(ca.into_iter().collect())
}

fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<FeatureRow>, String> {
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(format!("missing column '{name}'"));
        }
    }

    let date_col = df
        .column("date")
        .map_err(|e| e.to_string())?
        .cast(&DataType::Int32)
        .map_err(|e| format!("date: {e}"))?;
    let days = date_col.i32().map_err(|e| format!("date: {e}"))?;
    let volumes = df
        .column("volume")
        .map_err(|e| e.to_string())?
        .u64()
        .map_err(|e| format!("volume: {e}"))?;
    let anomalies = df
        .column("anomaly")
        .map_err(|e| e.to_string())?
        .bool()
        .map_err(|e| format!("anomaly: {e}"))?;

    let open = f64_values(df, "open")?;
    let high = f64_values(df, "high")?;
    let low = f64_values(df, "low")?;
    let close = f64_values(df, "close")?;
    let adj_close = f64_values(df, "adj_close")?;
    let ret = f64_values(df, "ret")?;
    let illiquidity = f64_values(df, "illiquidity")?;
    let z_score = f64_values(df, "z_score")?;

    let nan = |v: Option<f64>| v.unwrap_or(f64::NAN);
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let day = days.get(i).ok_or_else(|| format!("null date at row {i}"))?;
        rows.push(FeatureRow {
            bar: Bar {
                date: epoch() + chrono::Duration::days(i64::from(day)),
                open: nan(open[i]),
                high: nan(high[i]),
                low: nan(low[i]),
                close: nan(close[i]),
                adj_close: nan(adj_close[i]),
                volume: volumes.get(i).unwrap_or(0),
            },
            ret: ret[i].ok_or_else(|| format!("null ret at row {i}"))?,
            illiquidity: illiquidity[i].ok_or_else(|| format!("null illiquidity at row {i}"))?,
            z_score: z_score[i].ok_or_else(|| format!("null z_score at row {i}"))?,
            anomaly: anomalies.get(i).unwrap_or(false),
        });
    }

    if rows.windows(2).any(|w| w[0].bar.date >= w[1].bar.date) {
        return Err("rows not strictly ascending by date".into());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ticker: &str, n: u32) -> FeatureTable {
        let rows = (1..=n)
            .map(|d| FeatureRow {
                bar: Bar {
                    date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
                    open: 10.0 + f64::from(d),
                    high: 11.0 + f64::from(d),
                    low: 9.0 + f64::from(d),
                    close: 10.5 + f64::from(d),
                    adj_close: 10.4 + f64::from(d),
                    volume: 1_000 * u64::from(d),
                },
                ret: 0.01 * f64::from(d),
                illiquidity: 1e-10 * f64::from(d),
                z_score: -0.5 + f64::from(d),
                anomaly: d % 3 == 0,
            })
            .collect();
        FeatureTable::new(ticker, rows)
    }

    #[test]
    fn store_then_load_preserves_columns() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetFeatureCache::new(dir.path());
        let original = table("AAPL", 5);

        cache.store("AAPL", &original).unwrap();
        let loaded = cache.load("AAPL").unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn absent_ticker_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetFeatureCache::new(dir.path());
        assert!(cache.load("NOPE").unwrap().is_none());
    }

    #[test]
    fn layout_matches_hive_style() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetFeatureCache::new(dir.path());
        cache.store("MSFT", &table("MSFT", 2)).unwrap();
        assert!(dir.path().join("ticker=MSFT/features.parquet").is_file());
        assert!(dir.path().join("ticker=MSFT/meta.json").is_file());
        assert!(!dir.path().join("ticker=MSFT/features.parquet.tmp").exists());
    }

    #[test]
    fn dataframe_rejects_missing_column() {
        let mut df = rows_to_dataframe(&table("X", 2).rows).unwrap();
        let _ = df.drop_in_place("z_score").unwrap();
        assert!(dataframe_to_rows(&df).unwrap_err().contains("z_score"));
    }
}
