//! Presentation helpers over an immutable [`FeatureTable`].
//!
//! Nothing here feeds back into the pipeline.

use chrono::NaiveDate;

use crate::domain::{FeatureRow, FeatureTable};

/// Rows shown by default in the backtest view.
pub const DEFAULT_BACKTEST_ROWS: usize = 60;

/// Rows with `start <= date <= end`.
pub fn slice_by_date(table: &FeatureTable, start: NaiveDate, end: NaiveDate) -> &[FeatureRow] {
    let lo = table.rows.partition_point(|r| r.date() < start);
    let hi = table.rows.partition_point(|r| r.date() <= end);
    if lo >= hi {
        &[]
    } else {
        &table.rows[lo..hi]
    }
}

/// Running sum of simple returns.
pub fn cumulative_returns(rows: &[FeatureRow]) -> Vec<f64> {
    rows.iter()
        .scan(0.0, |acc, r| {
            *acc += r.ret;
            Some(*acc)
        })
        .collect()
}

/// Default backtest range: the last [`DEFAULT_BACKTEST_ROWS`] rows.
pub fn default_range(table: &FeatureTable) -> Option<(NaiveDate, NaiveDate)> {
    let last = table.rows.last()?;
    let first = &table.rows[table.len().saturating_sub(DEFAULT_BACKTEST_ROWS)];
    Some((first.date(), last.date()))
}

/// A date-range slice with its summary statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestView<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: &'a [FeatureRow],
    pub cumulative: Vec<f64>,
}

impl<'a> BacktestView<'a> {
    pub fn new(table: &'a FeatureTable, start: NaiveDate, end: NaiveDate) -> Self {
        let rows = slice_by_date(table, start, end);
        Self {
            start,
            end,
            rows,
            cumulative: cumulative_returns(rows),
        }
    }

    /// View over [`default_range`], or an empty view for an empty table.
    pub fn latest(table: &'a FeatureTable) -> Self {
        match default_range(table) {
            Some((start, end)) => Self::new(table, start, end),
            None => Self {
                start: NaiveDate::default(),
                end: NaiveDate::default(),
                rows: &[],
                cumulative: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_return(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn anomaly_count(&self) -> usize {
        self.rows.iter().filter(|r| r.anomaly).count()
    }

    pub fn mean_illiquidity(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|r| r.illiquidity).sum::<f64>() / self.rows.len() as f64
    }

    pub fn max_illiquidity(&self) -> f64 {
        self.rows.iter().map(|r| r.illiquidity).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::Duration;

    fn table(n: usize) -> FeatureTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = (0..n)
            .map(|i| FeatureRow {
                bar: Bar {
                    date: start + Duration::days(i as i64),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    adj_close: 1.0,
                    volume: 100,
                },
                ret: 0.01,
                illiquidity: i as f64,
                z_score: 0.0,
                anomaly: i % 10 == 0,
            })
            .collect();
        FeatureTable::new("T", rows)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn slice_is_inclusive() {
        let t = table(10);
        let rows = slice_by_date(&t, day(3), day(5));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date(), day(3));
        assert_eq!(rows[2].date(), day(5));
    }

    #[test]
    fn inverted_range_is_empty() {
        let t = table(10);
        assert!(slice_by_date(&t, day(6), day(2)).is_empty());
    }

    #[test]
    fn cumulative_is_running_sum() {
        let t = table(4);
        let cum = cumulative_returns(&t.rows);
        assert_eq!(cum.len(), 4);
        assert!((cum[3] - 0.04).abs() < 1e-12);
    }

    #[test]
    fn default_range_covers_last_sixty_rows() {
        let t = table(100);
        let (start, end) = default_range(&t).unwrap();
        assert_eq!(start, t.rows[40].date());
        assert_eq!(end, t.rows[99].date());

        let short = table(5);
        assert_eq!(default_range(&short).unwrap().0, short.rows[0].date());
        assert!(default_range(&table(0)).is_none());
    }

    #[test]
    fn backtest_summary() {
        let t = table(100);
        let view = BacktestView::latest(&t);
        assert_eq!(view.rows.len(), 60);
        assert_eq!(view.anomaly_count(), 6);
        assert!((view.total_return() - 0.6).abs() < 1e-9);
        assert!((view.mean_illiquidity() - 69.5).abs() < 1e-9);
        assert_eq!(view.max_illiquidity(), 99.0);
    }

    #[test]
    fn empty_table_view() {
        let t = table(0);
        let view = BacktestView::latest(&t);
        assert!(view.is_empty());
        assert_eq!(view.total_return(), 0.0);
        assert_eq!(view.mean_illiquidity(), 0.0);
    }
}
