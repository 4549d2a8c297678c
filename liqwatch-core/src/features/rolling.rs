//! Causal rolling z-score.
//!
//! Each output only looks at the current value and the `window - 1` values
//! before it. Until a full window is available the mean is taken as `0` and
//! the standard deviation as `1`, so the z-score equals the raw value during
//! warm-up. A zero (or non-finite) standard deviation is also replaced by `1`.
//!
//! Uses the sample standard deviation (divide by N - 1).

/// Default trailing window, in observations.
pub const DEFAULT_WINDOW: usize = 20;

/// Smallest window the sample standard deviation is defined for.
pub const MIN_WINDOW: usize = 2;

/// Trailing z-score of each value over the last `window` observations.
///
/// # Panics
///
/// If `window < 2`; the sample standard deviation needs two points.
pub fn rolling_z_scores(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= MIN_WINDOW, "rolling z-score window must be >= {MIN_WINDOW}");

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i + 1 < window {
                return v;
            }
            let slice = &values[i + 1 - window..=i];
            let (mean, std) = mean_and_sample_std(slice);
            let denom = if std > 0.0 && std.is_finite() { std } else { 1.0 };
            (v - mean) / denom
        })
        .collect()
}

fn mean_and_sample_std(slice: &[f64]) -> (f64, f64) {
    let n = slice.len() as f64;
    let mean = slice.iter().sum::<f64>() / n;
    let var = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
