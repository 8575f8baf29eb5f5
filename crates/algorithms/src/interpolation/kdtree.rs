//! 2D k-d tree for nearest-neighbour queries over sample locations
//!
//! Median-split tree built in place with `select_nth_unstable`; queries keep
//! a bounded max-heap of the best candidates found so far.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use soilmap_core::{Error, Result};

use super::SamplePoint;

/// A 2D k-d tree over sample points.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<SamplePoint>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbor query
#[derive(Debug, Clone, Copy)]
pub struct NearestResult {
    pub point: SamplePoint,
    pub distance_sq: f64,
    /// Position of the point in the slice the tree was built from
    pub index: usize,
}

/// Heap entry ordered by distance, then by index so ties are deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance_sq: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl KdTree {
    /// Build a k-d tree from sample points.
    ///
    /// Fails with `Error::Estimation` if any coordinate is not finite.
    pub fn build(points: &[SamplePoint]) -> Result<Self> {
        if let Some(i) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::Estimation(format!(
                "k-d tree: sample {} has a non-finite coordinate",
                i
            )));
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        build_recursive(points, &mut indices, 0, &mut nodes);

        Ok(Self {
            nodes,
            points: points.to_vec(),
        })
    }

    /// Number of points in the tree.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Find the single nearest point to (qx, qy).
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<NearestResult> {
        self.k_nearest(qx, qy, 1).into_iter().next()
    }

    /// Find the k nearest points to (qx, qy), sorted by ascending distance.
    ///
    /// Returns all points when `k` exceeds the tree size.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<NearestResult> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| NearestResult {
                point: self.points[c.index],
                distance_sq: c.distance_sq,
                index: c.index,
            })
            .collect()
    }

    fn knn_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let node = &self.nodes[node_idx];
        let p = &self.points[node.point_idx];
        let dx = qx - p.x;
        let dy = qy - p.y;

        let candidate = Candidate {
            distance_sq: dx * dx + dy * dy,
            index: node.point_idx,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.knn_recursive(child, qx, qy, k, heap);
        }

        let bound = match heap.peek() {
            Some(worst) if heap.len() >= k => worst.distance_sq,
            _ => f64::INFINITY,
        };
        if diff * diff <= bound {
            if let Some(child) = far {
                self.knn_recursive(child, qx, qy, k, heap);
            }
        }
    }
}

fn split_coord(p: &SamplePoint, dim: u8) -> f64 {
    if dim == 0 { p.x } else { p.y }
}

fn build_recursive(
    points: &[SamplePoint],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> Option<usize> {
    if indices.is_empty() {
        return None;
    }

    let split_dim = (depth % 2) as u8;
    let median = indices.len() / 2;
    indices.select_nth_unstable_by(median, |&a, &b| {
        split_coord(&points[a], split_dim).total_cmp(&split_coord(&points[b], split_dim))
    });

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let left_idx = build_recursive(points, left, depth + 1, nodes);
    let right_idx = build_recursive(points, &mut rest[1..], depth + 1, nodes);
    nodes[node_idx].left = left_idx;
    nodes[node_idx].right = right_idx;

    Some(node_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(2.0, 3.0, 10.0),
            SamplePoint::new(5.0, 4.0, 20.0),
            SamplePoint::new(9.0, 6.0, 30.0),
            SamplePoint::new(4.0, 7.0, 40.0),
            SamplePoint::new(8.0, 1.0, 50.0),
            SamplePoint::new(7.0, 2.0, 60.0),
            SamplePoint::new(1.0, 8.0, 70.0),
            SamplePoint::new(6.0, 5.0, 80.0),
        ]
    }

    fn brute_force(pts: &[SamplePoint], qx: f64, qy: f64) -> Vec<f64> {
        let mut d: Vec<f64> = pts.iter().map(|p| p.dist_sq(qx, qy)).collect();
        d.sort_by(|a, b| a.total_cmp(b));
        d
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
        assert!(tree.k_nearest(0.0, 0.0, 3).is_empty());
    }

    #[test]
    fn test_nearest_exact() {
        let tree = KdTree::build(&sample_points()).unwrap();
        let result = tree.nearest(5.0, 4.0).unwrap();
        assert!(result.distance_sq < 1e-12);
        assert_eq!(result.point.value, 20.0);
        assert_eq!(result.index, 1);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let pts = sample_points();
        let tree = KdTree::build(&pts).unwrap();

        for qx in 0..10 {
            for qy in 0..10 {
                let (qx, qy) = (qx as f64 + 0.5, qy as f64 + 0.5);
                let bf = brute_force(&pts, qx, qy);
                for k in [1, 3, 5] {
                    let got = tree.k_nearest(qx, qy, k);
                    assert_eq!(got.len(), k);
                    for (r, expected) in got.iter().zip(&bf) {
                        assert!(
                            (r.distance_sq - expected).abs() < 1e-10,
                            "k={} at ({}, {}): tree={:.4}, bf={:.4}",
                            k, qx, qy, r.distance_sq, expected
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_k_nearest_more_than_points() {
        let pts = sample_points();
        let tree = KdTree::build(&pts).unwrap();
        let results = tree.k_nearest(5.0, 5.0, 100);
        assert_eq!(results.len(), pts.len());
        assert!(results.windows(2).all(|w| w[0].distance_sq <= w[1].distance_sq));
    }

    #[test]
    fn test_duplicate_locations() {
        let pts: Vec<SamplePoint> = (0..6).map(|i| SamplePoint::new(1.0, 1.0, i as f64)).collect();
        let tree = KdTree::build(&pts).unwrap();
        let knn = tree.k_nearest(1.0, 1.0, 4);
        assert_eq!(knn.len(), 4);
        assert!(knn.iter().all(|r| r.distance_sq == 0.0));
        // Ties resolve by index
        let idx: Vec<usize> = knn.iter().map(|r| r.index).collect();
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_rejects_non_finite() {
        let pts = vec![SamplePoint::new(0.0, 0.0, 1.0), SamplePoint::new(f64::NAN, 1.0, 2.0)];
        assert!(KdTree::build(&pts).is_err());
    }

    #[test]
    fn test_large_dataset() {
        let pts: Vec<SamplePoint> = (0..1000)
            .map(|i| {
                let x = ((i * 7 + 13) % 100) as f64;
                let y = ((i * 11 + 37) % 100) as f64;
                SamplePoint::new(x, y, i as f64)
            })
            .collect();
        let tree = KdTree::build(&pts).unwrap();
        assert_eq!(tree.len(), 1000);

        let got = tree.k_nearest(50.3, 49.7, 15);
        let bf = brute_force(&pts, 50.3, 49.7);
        for (r, expected) in got.iter().zip(&bf) {
            assert!((r.distance_sq - expected).abs() < 1e-10);
        }
    }
}
