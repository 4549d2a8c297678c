//! CSV / JSON rendering of feature tables.

use anyhow::{Context, Result};
use liqwatch_core::{FeatureRow, FeatureTable};

const HEADER: [&str; 12] = [
    "ticker",
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

/// One CSV line per row, header first.
pub fn rows_to_csv(ticker: &str, rows: &[FeatureRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record([
            ticker.to_string(),
            row.bar.date.to_string(),
            row.bar.open.to_string(),
            row.bar.high.to_string(),
            row.bar.low.to_string(),
            row.bar.close.to_string(),
            row.bar.adj_close.to_string(),
            row.bar.volume.to_string(),
            row.ret.to_string(),
            row.illiquidity.to_string(),
            row.z_score.to_string(),
            row.anomaly.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn table_to_csv(table: &FeatureTable) -> Result<String> {
    rows_to_csv(&table.ticker, &table.rows)
}

pub fn table_to_json(table: &FeatureTable) -> Result<String> {
    serde_json::to_string_pretty(table).context("failed to serialize feature table")
}
