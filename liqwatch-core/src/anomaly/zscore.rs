//! Whole-series z-score threshold detector.
//!
//! Cheaper alternative to the isolation forest. The seed is ignored.

use super::{check_input, sanitize, AnomalyDetector, AnomalyError, DEFAULT_MIN_SAMPLES};

#[derive(Debug, Clone)]
pub struct ZScoreThreshold {
    /// Flag points more than `k` sample standard deviations from the mean.
    pub k: f64,
    pub min_samples: usize,
}

impl Default for ZScoreThreshold {
    fn default() -> Self {
        Self {
            k: 3.0,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl AnomalyDetector for ZScoreThreshold {
    fn name(&self) -> &str {
        "zscore"
    }

    fn fit_and_score(
        &self,
        series: &[f64],
        outlier_fraction: f64,
        _seed: u64,
    ) -> Result<Vec<bool>, AnomalyError> {
        check_input(series, outlier_fraction, self.min_samples)?;

        let values = sanitize(series);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = var.sqrt();
        if std == 0.0 || !std.is_finite() {
            return Ok(vec![false; values.len()]);
        }

        let mut candidates: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, x)| (i, (x - mean).abs() / std))
            .filter(|&(_, z)| z > self.k)
            .collect();

        // Keep the largest deviations when more than the allowed share qualifies.
        let cap = (n * outlier_fraction).ceil() as usize;
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        candidates.truncate(cap);

        let mut flags = vec![false; values.len()];
        for (i, _) in candidates {
            flags[i] = true;
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_single_spike() {
        let mut series = vec![1e-10; 40];
        series[17] = 1e-7;
        let flags = ZScoreThreshold::default()
            .fit_and_score(&series, 0.05, 0)
            .unwrap();
        assert!(flags[17]);
        assert_eq!(flags.iter().filter(|&&f| f).count(), 1);
    }

    #[test]
    fn constant_series_is_clean() {
        let flags = ZScoreThreshold::default()
            .fit_and_score(&[2.0; 30], 0.05, 0)
            .unwrap();
        assert!(flags.iter().all(|&f| !f));
    }

    #[test]
    fn flag_count_is_capped() {
        let mut series = vec![0.0; 100];
        for (j, i) in [3, 20, 41, 55, 60, 77, 99].iter().enumerate() {
            series[*i] = 100.0 + j as f64;
        }
        let detector = ZScoreThreshold { k: 1.0, min_samples: 20 };
        let flags = detector.fit_and_score(&series, 0.05, 0).unwrap();
        assert_eq!(flags.iter().filter(|&&f| f).count(), 5);
        // The two smallest spikes are dropped.
        assert!(!flags[3]);
        assert!(!flags[20]);
        assert!(flags[99]);
    }
}
