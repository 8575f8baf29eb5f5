//! One attribute from point dataset to persisted surface

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use soilmap_core::io::{write_geotiff, Compression, GeoTiffOptions};
use soilmap_core::{Raster, Result};
use tracing::info;

use super::engine::{interpolate, EstimatorParams, InterpolationMethod};
use super::grid::{build_grid, GridParams, InterpolationGrid};
use super::PointDataset;
use crate::degradation::Degradation;
use crate::mask::mask_outside;

/// Configuration for [`SoilInterpolator`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub grid: GridParams,
    pub estimator: EstimatorParams,
    /// Null the cells outside the convex envelope of the samples
    pub use_mask: bool,
    /// Compression of the written GeoTIFF
    pub compression: Compression,
}

/// Summary over the non-null cells of a surface.
///
/// All three values are NaN when there is no valid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid_cells: usize,
}

impl SurfaceStats {
    pub fn from_raster(raster: &Raster<f64>) -> Self {
        let stats = raster.statistics();
        Self {
            min: stats.min.unwrap_or(f64::NAN),
            max: stats.max.unwrap_or(f64::NAN),
            mean: stats.mean.unwrap_or(f64::NAN),
            valid_cells: stats.valid_count,
        }
    }
}

/// The machine-readable summary line printed after an interpolation run
pub fn format_stats_line(stats: &SurfaceStats) -> String {
    format!(
        "STATS: min={:.3}, max={:.3}, mean={:.3}",
        stats.min, stats.max, stats.mean
    )
}

/// `{parameter}_{method}_interpolation.tif`
pub fn output_file_name(parameter: &str, method: InterpolationMethod) -> String {
    format!("{}_{}_interpolation.tif", parameter, method)
}

/// Result of one attribute run
#[derive(Debug, Clone)]
pub struct SurfaceResult {
    pub parameter: String,
    pub method: InterpolationMethod,
    /// Estimator that produced the surface; differs from `method` after a fallback
    pub estimator: &'static str,
    pub surface: Raster<f64>,
    pub stats: SurfaceStats,
    pub degradations: Vec<Degradation>,
    pub grid: InterpolationGrid,
    pub samples_used: usize,
}

impl SurfaceResult {
    pub fn stats_line(&self) -> String {
        format_stats_line(&self.stats)
    }
}

/// Runs sample extraction, grid building, interpolation and optional masking.
#[derive(Debug, Clone, Default)]
pub struct SoilInterpolator {
    config: InterpolationConfig,
}

impl SoilInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Interpolate one attribute of the dataset.
    ///
    /// The grid always covers the full dataset extent, so surfaces of
    /// different attributes from the same dataset line up cell for cell.
    ///
    /// # Errors
    /// `Validation` when the attribute is missing or has fewer than three
    /// valid values; `InvalidParameter` for a bad grid configuration.
    pub fn interpolate_parameter(
        &self,
        dataset: &PointDataset,
        parameter: &str,
        method: InterpolationMethod,
    ) -> Result<SurfaceResult> {
        let samples = dataset.samples(parameter)?;
        let grid = build_grid(&dataset.extent(), &self.config.grid)?;

        let outcome = interpolate(&samples, &grid, method, &self.config.estimator)?;
        let surface = if self.config.use_mask {
            mask_outside(&outcome.surface, dataset.envelope())?
        } else {
            outcome.surface
        };

        let stats = SurfaceStats::from_raster(&surface);
        info!(
            parameter,
            method = %method,
            estimator = outcome.estimator,
            min = stats.min,
            max = stats.max,
            mean = stats.mean,
            "interpolation finished"
        );

        Ok(SurfaceResult {
            parameter: parameter.to_string(),
            method,
            estimator: outcome.estimator,
            surface,
            stats,
            degradations: outcome.degradations,
            grid,
            samples_used: samples.len(),
        })
    }

    /// Write the surface as `{parameter}_{method}_interpolation.tif` in `dir`.
    pub fn save_surface(&self, result: &SurfaceResult, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(output_file_name(&result.parameter, result.method));
        let options = GeoTiffOptions {
            compression: self.config.compression,
            description: Some(result.parameter.clone()),
        };
        write_geotiff(&result.surface, &path, Some(options))?;
        info!(path = %path.display(), "surface saved");
        Ok(path)
    }
}
