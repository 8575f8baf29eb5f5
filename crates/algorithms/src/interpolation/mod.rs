//! Spatial interpolation of soil samples onto a regular grid
//!
//! - Dataset: point features with loosely typed attributes
//! - Grid: buffered lon/lat lattice sized by a ground resolution
//! - Ordinary Kriging: spherical (or other) variogram, dual-form estimate
//! - IDW: Inverse Distance Weighting over the k nearest samples
//! - Engine: ordered estimator chain with recorded fallbacks
//! - Pipeline: one attribute from dataset to persisted surface

mod dataset;
mod engine;
mod grid;
mod idw;
pub mod kdtree;
mod kriging;
mod pipeline;
pub mod variogram;

pub use dataset::{Extent, PointDataset, SampleSite, MIN_VALID_SAMPLES};
pub use engine::{
    estimator_chain, interpolate, run_chain, Estimator, EstimatorParams, Interpolation,
    InterpolationMethod, MeanFill, FALLBACK_IDW_POWER,
};
pub use grid::{build_grid, GridParams, InterpolationGrid, METERS_PER_DEGREE};
pub use idw::{default_neighbours, idw_weights, IdwEstimator};
pub use kdtree::{KdTree, NearestResult};
pub use kriging::{KrigingModel, OrdinaryKrigingEstimator};
pub use pipeline::{
    format_stats_line, output_file_name, InterpolationConfig, SoilInterpolator, SurfaceResult,
    SurfaceStats,
};
pub use variogram::{
    default_lag_count, empirical_variogram, fit_variogram, EmpiricalVariogram, FittedVariogram,
    VariogramModel,
};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}
