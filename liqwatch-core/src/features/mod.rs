//! Liquidity feature pipeline: bars → returns → Amihud illiquidity → rolling z-score.
//!
//! Pure and deterministic. Anomaly flags are left `false` here and filled in
//! by the scorer, which needs the whole illiquidity column at once.

pub mod returns;
pub mod rolling;

pub use returns::{amihud_illiquidity, simple_returns};
pub use rolling::{rolling_z_scores, DEFAULT_WINDOW, MIN_WINDOW};

use crate::domain::{Bar, FeatureRow, FeatureTable};

/// Enrich `bars` (date ascending, unique dates) into a feature table.
///
/// Produces exactly one row per bar in input order. Fewer than two bars is
/// degenerate but not an error: every row gets `ret = 0` and `illiquidity = 0`.
pub fn compute_features(ticker: &str, bars: &[Bar], window: usize) -> FeatureTable {
    debug_assert!(
        bars.windows(2).all(|w| w[0].date < w[1].date),
        "bars must be strictly ascending by date"
    );

    let (rets, illiquidity, z_scores) = if bars.len() < 2 {
        let zeros = vec![0.0; bars.len()];
        (zeros.clone(), zeros.clone(), zeros)
    } else {
        let prices: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();
        let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
        let rets = simple_returns(&prices);
        let illiquidity = amihud_illiquidity(&rets, &volumes);
        let z_scores = rolling_z_scores(&illiquidity, window);
        (rets, illiquidity, z_scores)
    };

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            bar: bar.clone(),
            ret: rets[i],
            illiquidity: illiquidity[i],
            z_score: z_scores[i],
            anomaly: false,
        })
        .collect();

    FeatureTable::new(ticker, rows)
}
