use std::collections::HashMap;

/// Label DBSCAN assigns to points that belong to no cluster.
pub const NOISE: i32 = -1;

/// Union-Find data structure for merging connected core points.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]); // path compression
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        if self.rank[rx] < self.rank[ry] {
            self.parent[rx] = ry;
        } else if self.rank[rx] > self.rank[ry] {
            self.parent[ry] = rx;
        } else {
            self.parent[ry] = rx;
            self.rank[rx] += 1;
        }
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Density-based clustering over points in feature space.
///
/// A point is a core point when at least `min_samples` points (itself included)
/// lie within `eps`. Core points within `eps` of each other share a cluster;
/// border points join the cluster of their lowest-indexed core neighbour; the
/// rest are `NOISE`. Labels are numbered from 0 in order of first appearance.
pub fn dbscan(points: &[Vec<f64>], eps: f64, min_samples: usize) -> Vec<i32> {
    let n = points.len();
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| euclidean(&points[i], &points[j]) <= eps)
                .collect()
        })
        .collect();
    let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut uf = UnionFind::new(n);
    for i in (0..n).filter(|&i| is_core[i]) {
        for &j in neighbours[i].iter().filter(|&&j| is_core[j]) {
            uf.union(i, j);
        }
    }

    let mut root_to_label: HashMap<usize, i32> = HashMap::new();
    let mut labels = vec![NOISE; n];

    for i in 0..n {
        let anchor = if is_core[i] {
            Some(i)
        } else {
            neighbours[i].iter().copied().find(|&j| is_core[j])
        };

        if let Some(core) = anchor {
            let root = uf.find(core);
            let next = root_to_label.len() as i32;
            labels[i] = *root_to_label.entry(root).or_insert(next);
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_dense_groups_and_noise() {
        let mut points = Vec::new();
        for i in 0..5 {
            points.push(vec![0.0 + i as f64 * 0.1, 0.0]);
        }
        for i in 0..5 {
            points.push(vec![10.0 + i as f64 * 0.1, 10.0]);
        }
        points.push(vec![50.0, -50.0]);

        let labels = dbscan(&points, 0.5, 5);
        assert!(labels[..5].iter().all(|&l| l == 0));
        assert!(labels[5..10].iter().all(|&l| l == 1));
        assert_eq!(labels[10], NOISE);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // Four tightly packed points plus one at the edge of the first point's radius.
        let points = vec![
            vec![0.0],
            vec![0.1],
            vec![0.2],
            vec![0.3],
            vec![0.75],
        ];
        let labels = dbscan(&points, 0.5, 4);
        assert_eq!(labels, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_sparse_points_are_all_noise() {
        let points: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64 * 10.0]).collect();
        assert!(dbscan(&points, 0.5, 2).iter().all(|&l| l == NOISE));
        assert!(dbscan(&[], 0.5, 2).is_empty());
    }
}
