//! Isolation forest over a single feature.
//!
//! Outliers sit in sparse regions and get isolated by fewer random splits, so
//! their average path length over the forest is short. Trees are independent
//! and built in parallel; each draws from its own seed derived from the
//! caller's seed, which keeps the result identical across thread counts.

use rand::Rng;
use rayon::prelude::*;

use super::{check_input, sanitize, AnomalyDetector, AnomalyError, DEFAULT_MIN_SAMPLES};
use crate::seed::SeedHierarchy;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug)]
enum Node {
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(values: &[f64], sample: Vec<usize>, max_depth: usize, rng: &mut impl Rng) -> Self {
        Self {
            root: Self::grow(values, sample, 0, max_depth, rng),
        }
    }

    fn grow(
        values: &[f64],
        idx: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> Node {
        if depth >= max_depth || idx.len() <= 1 {
            return Node::Leaf { size: idx.len() };
        }

        let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(values[i]), hi.max(values[i]))
        });
        // Exact comparison: illiquidity lives around 1e-10, so no epsilon.
        if hi <= lo {
            return Node::Leaf { size: idx.len() };
        }

        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            idx.into_iter().partition(|&i| values[i] < threshold);

        if left.is_empty() || right.is_empty() {
            return Node::Leaf {
                size: left.len() + right.len(),
            };
        }

        Node::Split {
            threshold,
            left: Box::new(Self::grow(values, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(values, right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if x < *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` items.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Univariate isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_trees: usize,
    pub max_samples: usize,
    pub min_samples: usize,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl IsolationForest {
    pub fn new(n_trees: usize, max_samples: usize, min_samples: usize) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_samples: max_samples.max(2),
            min_samples,
        }
    }

    /// Anomaly score in (0, 1] per element; higher is more isolated.
    pub fn scores(&self, series: &[f64], seed: u64) -> Vec<f64> {
        let values = sanitize(series);
        let n = values.len();
        if n == 0 {
            return Vec::new();
        }
        let subsample = self.max_samples.min(n);
        let max_depth = (subsample as f64).log2().ceil().max(1.0) as usize;
        let seeds = SeedHierarchy::new(seed);

        let trees: Vec<IsolationTree> = (0..self.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = seeds.rng_for("isolation_tree", t as u64);
                let sample = rand::seq::index::sample(&mut rng, n, subsample).into_vec();
                IsolationTree::build(&values, sample, max_depth, &mut rng)
            })
            .collect();

        let norm = average_path_length(subsample);
        values
            .par_iter()
            .map(|&x| {
                let mean_path =
                    trees.iter().map(|tree| tree.path_length(x)).sum::<f64>() / trees.len() as f64;
                if norm > 0.0 {
                    2f64.powf(-mean_path / norm)
                } else {
                    0.5
                }
            })
            .collect()
    }
}

impl AnomalyDetector for IsolationForest {
    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn fit_and_score(
        &self,
        series: &[f64],
        outlier_fraction: f64,
        seed: u64,
    ) -> Result<Vec<bool>, AnomalyError> {
        check_input(series, outlier_fraction, self.min_samples)?;

        let values = sanitize(series);
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        if hi == lo {
            return Ok(vec![false; series.len()]);
        }

        let scores = self.scores(&values, seed);
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let n = sorted.len();
        let cut = ((n as f64 * outlier_fraction).ceil() as usize).min(n - 1);
        let threshold = sorted[cut];

        Ok(scores.into_iter().map(|s| s > threshold).collect())
    }
}
