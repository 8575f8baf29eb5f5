//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates each grid cell as a weighted average of its k nearest
//! samples, with weights inversely proportional to distance raised to a
//! power parameter:
//!
//! ```text
//! z(x,y) = Σ(wᵢ·zᵢ) / Σ(wᵢ)    where wᵢ = 1 / dᵢ^p
//! ```
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use crate::maybe_rayon::*;
use soilmap_core::{Error, Raster, Result};

use super::engine::Estimator;
use super::kdtree::KdTree;
use super::{InterpolationGrid, SamplePoint};

/// Distance substituted for an exact hit so the weight stays finite
pub const ZERO_DISTANCE: f64 = 1e-12;

/// Neighbourhood size for `n` samples: at least 15 (when available),
/// growing as n/5, never more than n.
pub fn default_neighbours(n: usize) -> usize {
    (n / 5).max(15).min(n)
}

/// Normalised inverse-distance weights. Zero distances are replaced by
/// [`ZERO_DISTANCE`].
pub fn idw_weights(distances: &[f64], power: f64) -> Vec<f64> {
    let raw: Vec<f64> = distances
        .iter()
        .map(|&d| 1.0 / d.max(ZERO_DISTANCE).powf(power))
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// IDW over the k nearest samples of every grid cell.
#[derive(Debug, Clone, Copy)]
pub struct IdwEstimator {
    /// Power parameter (default 2.0); higher values favour closer samples
    pub power: f64,
    /// Fixed neighbourhood size; `None` uses [`default_neighbours`]
    pub neighbours: Option<usize>,
}

impl Default for IdwEstimator {
    fn default() -> Self {
        Self {
            power: 2.0,
            neighbours: None,
        }
    }
}

impl IdwEstimator {
    pub fn with_power(power: f64) -> Self {
        Self {
            power,
            ..Default::default()
        }
    }
}

impl Estimator for IdwEstimator {
    fn name(&self) -> &'static str {
        "idw"
    }

    fn estimate(&self, points: &[SamplePoint], grid: &InterpolationGrid) -> Result<Raster<f64>> {
        if points.is_empty() {
            return Err(Error::Estimation("no sample points".into()));
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(Error::Estimation(format!("invalid IDW power {}", self.power)));
        }

        let tree = KdTree::build(points)?;
        let k = self
            .neighbours
            .unwrap_or_else(|| default_neighbours(points.len()))
            .clamp(1, points.len());
        let power = self.power;
        let cols = grid.cols();

        let data: Vec<f64> = (0..grid.rows())
            .into_par_iter()
            .flat_map(|row| {
                let y = grid.ys[row];
                let mut row_data = Vec::with_capacity(cols);
                let mut distances = Vec::with_capacity(k);

                for &x in &grid.xs {
                    let neighbours = tree.k_nearest(x, y, k);
                    distances.clear();
                    distances.extend(neighbours.iter().map(|n| n.distance_sq.sqrt()));

                    let weights = idw_weights(&distances, power);
                    let value: f64 = neighbours
                        .iter()
                        .zip(&weights)
                        .map(|(n, w)| w * n.point.value)
                        .sum();
                    row_data.push(value);
                }

                row_data
            })
            .collect();

        grid.raster(data)
    }
}
