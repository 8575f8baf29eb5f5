//! Percentile classification with class areas, colouring and outline

use geo::MultiPolygon;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use soilmap_colormap::{render_classes, RgbImage};
use soilmap_core::{Algorithm, Error, Raster, Result, CRS};
use tracing::{debug, info, warn};

use super::clip::{clip_to_geometry, prepare_boundary, Boundary};
use super::outline::outline_rings;
use super::percentile::{class_index, percentile_breaks};
use crate::degradation::Degradation;

/// Class index written into null cells
pub const NULL_CLASS: i16 = -1;

/// One row of the class table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassEntry {
    pub index: usize,
    /// Lower break (exclusive, except for class 0)
    pub min: f64,
    /// Upper break (inclusive); the data maximum for the last class
    pub max: f64,
    pub pixels: usize,
    pub area_ha: f64,
    pub percent: f64,
}

/// Parameters for [`classify`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyParams {
    /// Number of classes (default 8)
    pub num_classes: usize,
    /// Optional study-area boundary used to clip the surface
    #[serde(skip)]
    pub boundary: Option<Boundary>,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            num_classes: 8,
            boundary: None,
        }
    }
}

/// Output of [`classify`]
#[derive(Debug, Clone)]
pub struct ClassifiedMap {
    /// One RGB pixel per cell, white for null
    pub image: RgbImage,
    /// Class index per cell, [`NULL_CLASS`] for null
    pub classes: Raster<i16>,
    /// The `num_classes + 1` percentile breaks
    pub breaks: Vec<f64>,
    pub table: Vec<ClassEntry>,
    /// (min, max, mean) of the valid cells
    pub stats: (f64, f64, f64),
    /// Boundary rings as `(col, row)` in the classified raster
    pub boundary_rings: Vec<Vec<(usize, usize)>>,
    /// Area of the study-area boundary, when one was given and is measurable
    pub boundary_area_ha: Option<f64>,
    pub degradations: Vec<Degradation>,
}

fn degrade(degradations: &mut Vec<Degradation>, err: &Error) {
    warn!(reason = %err, "boundary clipping skipped, using the full surface");
    degradations.push(Degradation::clipping(err.to_string()));
}

/// Clip to the boundary when possible. The prepared geometry is returned
/// even when clipping itself failed, so the outline can still be drawn.
fn apply_boundary(
    surface: &Raster<f64>,
    boundary: &Boundary,
    degradations: &mut Vec<Degradation>,
) -> (Raster<f64>, Option<MultiPolygon<f64>>) {
    let target = surface.crs().cloned().unwrap_or_else(CRS::wgs84);
    let geometry = match prepare_boundary(boundary, &target) {
        Ok(g) => g,
        Err(e) => {
            degrade(degradations, &e);
            return (surface.clone(), None);
        }
    };

    match clip_to_geometry(surface, &geometry) {
        Ok(clipped) => (clipped, Some(geometry)),
        Err(e) => {
            degrade(degradations, &e);
            (surface.clone(), Some(geometry))
        }
    }
}

/// Classify a surface into `num_classes` percentile bands.
///
/// Returns `Ok(None)` when the (clipped) surface has no valid cell.
/// Boundary problems never fail the call; they are recorded as
/// [`Degradation::ClippingDegraded`] and the unclipped surface is used.
///
/// # Errors
/// `InvalidParameter` when `num_classes` is zero or does not fit the class raster.
pub fn classify(surface: &Raster<f64>, params: &ClassifyParams) -> Result<Option<ClassifiedMap>> {
    let n = params.num_classes;
    if n == 0 || n > i16::MAX as usize {
        return Err(Error::InvalidParameter {
            name: "num_classes",
            value: n.to_string(),
            reason: format!("must be between 1 and {}", i16::MAX),
        });
    }

    let mut degradations = Vec::new();
    let (working, geometry) = match &params.boundary {
        Some(boundary) => apply_boundary(surface, boundary, &mut degradations),
        None => (surface.clone(), None),
    };

    let values = working.valid_values();
    if values.is_empty() {
        warn!("surface has no valid cells, nothing to classify");
        return Ok(None);
    }

    let breaks = percentile_breaks(&values, n)?;
    let class_data: Array2<i16> = working.data().map(|&v| {
        if working.is_nodata(v) {
            NULL_CLASS
        } else {
            class_index(&breaks, v) as i16
        }
    });
    let classes = working.with_data(class_data)?;

    let mut counts = vec![0_usize; n];
    for &c in classes.data() {
        if let Ok(i) = usize::try_from(c) {
            counts[i] += 1;
        }
    }

    let (min, max, sum) = values.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(lo, hi, s), &v| (lo.min(v), hi.max(v), s + v),
    );
    let mean = sum / values.len() as f64;

    let pixel_area_ha = working.transform().pixel_area() / 10_000.0;
    let total_area: f64 = counts.iter().map(|&c| c as f64 * pixel_area_ha).sum();

    let table: Vec<ClassEntry> = counts
        .iter()
        .enumerate()
        .map(|(i, &pixels)| {
            let area_ha = pixels as f64 * pixel_area_ha;
            ClassEntry {
                index: i,
                min: breaks[i],
                max: if i + 1 < n { breaks[i + 1] } else { max },
                pixels,
                area_ha,
                percent: if total_area > 0.0 { area_ha / total_area * 100.0 } else { 0.0 },
            }
        })
        .collect();

    let (rows, cols) = classes.shape();
    let boundary_rings = geometry
        .map(|g| outline_rings(&g, classes.transform(), rows, cols))
        .unwrap_or_default();

    let image = render_classes(&classes, n);

    let boundary_area_ha = params.boundary.as_ref().and_then(|b| match b.area_hectares() {
        Ok(area) => Some(area),
        Err(e) => {
            debug!(reason = %e, "boundary area unavailable");
            None
        }
    });

    info!(
        classes = n,
        valid = values.len(),
        rows,
        cols,
        min,
        max,
        mean,
        rings = boundary_rings.len(),
        "surface classified"
    );

    Ok(Some(ClassifiedMap {
        image,
        classes,
        breaks,
        table,
        stats: (min, max, mean),
        boundary_rings,
        boundary_area_ha,
        degradations,
    }))
}

/// Percentile classifier as a pipeline stage
#[derive(Debug, Clone, Default)]
pub struct RasterClassifier;

impl Algorithm for RasterClassifier {
    type Input = Raster<f64>;
    type Output = Option<ClassifiedMap>;
    type Params = ClassifyParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RasterClassifier"
    }

    fn description(&self) -> &'static str {
        "Percentile classification with boundary clipping, class areas and RGB rendering"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        classify(&input, &params)
    }
}
