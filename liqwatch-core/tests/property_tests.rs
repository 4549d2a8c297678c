//! Property tests for feature and scoring invariants.
//!
//! 1. One feature row per bar, dates preserved in order
//! 2. Illiquidity is never negative, whatever the volume or price path
//! 3. Z-score equals illiquidity until the window fills
//! 4. Scoring is deterministic for a fixed seed and never exceeds the outlier share

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use liqwatch_core::anomaly::{AnomalyDetector, IsolationForest, ZScoreThreshold};
use liqwatch_core::data::canonicalize;
use liqwatch_core::features::{compute_features, DEFAULT_WINDOW};
use liqwatch_core::Bar;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..1_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_volume() -> impl Strategy<Value = u64> {
    prop_oneof![
        1 => Just(0u64),
        9 => 1u64..50_000_000,
    ]
}

fn arb_bars(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((arb_price(), arb_volume()), 0..max_len).prop_map(|pv| {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        pv.into_iter()
            .enumerate()
            .map(|(i, (p, v))| Bar {
                date: start + Duration::days(i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
                adj_close: p,
                volume: v,
            })
            .collect()
    })
}

fn arb_series() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..1e-6_f64, 20..150)
}

// ── 1. Shape ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn one_row_per_bar_in_date_order(bars in arb_bars(120)) {
        let table = compute_features("PROP", &bars, DEFAULT_WINDOW);
        prop_assert_eq!(table.len(), bars.len());
        for (row, bar) in table.rows.iter().zip(&bars) {
            prop_assert_eq!(row.date(), bar.date);
        }
        prop_assert_eq!(table.anomaly_count(), 0);
    }

    #[test]
    fn canonicalize_output_is_strictly_ascending(mut bars in arb_bars(60), seed in any::<u64>()) {
        // Shuffle deterministically and duplicate a few rows.
        let n = bars.len();
        if n > 1 {
            bars.rotate_left((seed as usize) % n);
            let dup = bars[0].clone();
            bars.push(dup);
        }
        let report = canonicalize(bars);
        prop_assert!(report.bars.windows(2).all(|w| w[0].date < w[1].date));
    }
}

// ── 2. Non-negative illiquidity ──────────────────────────────────────

proptest! {
    #[test]
    fn illiquidity_is_non_negative_and_finite(bars in arb_bars(120)) {
        let table = compute_features("PROP", &bars, DEFAULT_WINDOW);
        for row in &table.rows {
            prop_assert!(row.illiquidity >= 0.0);
            prop_assert!(row.illiquidity.is_finite());
            if row.bar.volume == 0 {
                prop_assert_eq!(row.illiquidity, 0.0);
            }
        }
    }
}

// ── 3. Warm-up identity ──────────────────────────────────────────────

proptest! {
    #[test]
    fn z_score_is_illiquidity_during_warm_up(bars in arb_bars(DEFAULT_WINDOW)) {
        let table = compute_features("PROP", &bars, DEFAULT_WINDOW);
        for row in &table.rows {
            prop_assert_eq!(row.z_score, row.illiquidity);
        }
    }
}

// ── 4. Scoring ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn isolation_forest_is_deterministic(series in arb_series(), seed in any::<u64>()) {
        let forest = IsolationForest::default();
        let a = forest.fit_and_score(&series, 0.05, seed).unwrap();
        let b = forest.fit_and_score(&series, 0.05, seed).unwrap();
        prop_assert_eq!(a.len(), series.len());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn flagged_share_is_bounded(series in arb_series(), fraction in 0.01..0.5_f64) {
        let cap = (series.len() as f64 * fraction).ceil() as usize;
        for detector in [
            Box::new(IsolationForest::default()) as Box<dyn AnomalyDetector>,
            Box::new(ZScoreThreshold::default()),
        ] {
            let flags = detector.fit_and_score(&series, fraction, 42).unwrap();
            let flagged = flags.iter().filter(|&&f| f).count();
            prop_assert!(flagged <= cap, "{} flagged {} > {}", detector.name(), flagged, cap);
        }
    }
}
