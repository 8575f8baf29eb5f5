//! # soilmap algorithms
//!
//! Turning soil sample points into classified attribute maps.
//!
//! ## Stages
//!
//! - **interpolation**: point dataset, grid builder, kriging / IDW estimator chain
//! - **mask**: null the surface outside the sample envelope
//! - **classification**: percentile classes, boundary clipping, area table, outline
//! - **vector**: cell-centre containment, polygon union
//!
//! Fallbacks inside a stage are reported as [`Degradation`] values next to
//! the result rather than as errors.

mod maybe_rayon;

pub mod classification;
pub mod degradation;
pub mod interpolation;
pub mod mask;
pub mod vector;

pub use degradation::Degradation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        classify, Boundary, ClassEntry, ClassifiedMap, ClassifyParams, RasterClassifier,
    };
    pub use crate::degradation::Degradation;
    pub use crate::interpolation::{
        build_grid, interpolate, EstimatorParams, GridParams, IdwEstimator, InterpolationConfig,
        InterpolationGrid, InterpolationMethod, OrdinaryKrigingEstimator, PointDataset,
        SamplePoint, SoilInterpolator, SurfaceResult, SurfaceStats,
    };
    pub use crate::mask::{mask_outside, AreaMask};
    pub use soilmap_core::prelude::*;
}
