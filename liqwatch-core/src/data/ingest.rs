//! Canonicalize fetched bars before feature computation: sort, dedupe, drop unusable rows.
//!
//! Rows without a finite, positive adjusted close are dropped rather than
//! interpolated, so the feature table only ever contains days the source
//! actually reported.

use crate::domain::Bar;

/// Cleaned bars plus counts of what was removed.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub bars: Vec<Bar>,
    pub dropped_unusable: usize,
    pub dropped_duplicates: usize,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.dropped_unusable + self.dropped_duplicates
    }
}

/// Sort ascending by date, keep the first bar per date, drop unusable rows.
pub fn canonicalize(mut bars: Vec<Bar>) -> IngestReport {
    let before = bars.len();
    bars.retain(Bar::is_usable);
    let dropped_unusable = before - bars.len();

    // Stable sort keeps the provider's first occurrence ahead of later duplicates.
    bars.sort_by_key(|b| b.date);
    let before_dedup = bars.len();
    bars.dedup_by_key(|b| b.date);
    let dropped_duplicates = before_dedup - bars.len();

    IngestReport {
        bars,
        dropped_unusable,
        dropped_duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, adj_close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: adj_close,
            high: adj_close,
            low: adj_close,
            close: adj_close,
            adj_close,
            volume: 100,
        }
    }

    #[test]
    fn sorts_unordered_input() {
        let report = canonicalize(vec![bar(3, 3.0), bar(1, 1.0), bar(2, 2.0)]);
        let days: Vec<f64> = report.bars.iter().map(|b| b.adj_close).collect();
        assert_eq!(days, vec![1.0, 2.0, 3.0]);
        assert_eq!(report.dropped(), 0);
    }

    #[test]
    fn keeps_first_duplicate() {
        let report = canonicalize(vec![bar(1, 1.0), bar(1, 9.0), bar(2, 2.0)]);
        assert_eq!(report.bars.len(), 2);
        assert_eq!(report.bars[0].adj_close, 1.0);
        assert_eq!(report.dropped_duplicates, 1);
    }

    #[test]
    fn drops_nan_and_non_positive_prices() {
        let report = canonicalize(vec![bar(1, f64::NAN), bar(2, 0.0), bar(3, 5.0)]);
        assert_eq!(report.bars.len(), 1);
        assert_eq!(report.dropped_unusable, 2);
    }
}
