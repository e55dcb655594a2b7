use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One randomly grown isolation tree, stored as an arena of nodes.
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(rows: &[Vec<f64>], sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(rows, sample, 0, max_depth, rng);
        tree
    }

    fn build(
        &mut self,
        rows: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });

        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary inside this node can split it.
        let width = rows[indices[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                    (lo.min(rows[i][f]), hi.max(rows[i][f]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| rows[i][feature] < threshold);

        let left = self.build(rows, left_idx, depth + 1, max_depth, rng);
        let right = self.build(rows, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree of `n` points.
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

/// Unsupervised outlier model. Fitting and scoring are deterministic for a
/// given seed and input.
pub struct IsolationForest {
    trees: usize,
    max_samples: usize,
    contamination: f64,
    seed: u64,
}

impl IsolationForest {
    pub fn new(trees: usize, max_samples: usize, contamination: f64, seed: u64) -> Self {
        Self {
            trees: trees.max(1),
            max_samples: max_samples.max(2),
            contamination,
            seed,
        }
    }

    /// Fit on `rows` and return each row's decision value. Values below zero mark
    /// the `contamination` share of most isolated rows.
    pub fn fit_decision(&self, rows: &[Vec<f64>]) -> eyre::Result<Vec<f64>> {
        if rows.len() < 2 {
            return Err(eyre::eyre!(
                "isolation forest needs at least 2 rows, got {}",
                rows.len()
            ));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(eyre::eyre!("isolation forest input contains non-finite values"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_size = self.max_samples.min(rows.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let forest: Vec<IsolationTree> = (0..self.trees)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
                IsolationTree::grow(rows, sample, max_depth, &mut rng)
            })
            .collect();

        let norm = average_path_length(sample_size);
        let scores: Vec<f64> = rows
            .iter()
            .map(|row| {
                let mean_depth =
                    forest.iter().map(|t| t.path_length(row)).sum::<f64>() / forest.len() as f64;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect();

        let offset = crate::stats::percentile(&scores, self.contamination * 100.0);
        Ok(scores.into_iter().map(|s| s - offset).collect())
    }
}
