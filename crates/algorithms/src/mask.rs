//! Area masking: null the surface outside a polygon

use geo::{MultiPolygon, Polygon};
use soilmap_core::{Algorithm, Error, Raster, Result};
use tracing::debug;

use crate::vector::polygon_mask;

/// Copy of `surface` with every cell whose centre lies outside `geometry`
/// set to NaN. Cells inside keep their value.
pub fn mask_to_geometry(surface: &Raster<f64>, geometry: &MultiPolygon<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = surface.shape();
    let inside = polygon_mask(surface.transform(), rows, cols, geometry)?;

    let mut out = surface.clone();
    out.data_mut().zip_mut_with(&inside, |v, &keep| {
        if !keep {
            *v = f64::NAN;
        }
    });
    out.set_nodata(Some(f64::NAN));

    debug!(inside = inside.iter().filter(|&&k| k).count(), cells = rows * cols, "surface masked");
    Ok(out)
}

/// Null the cells outside the sample envelope.
///
/// A degenerate envelope (one or two distinct points) contains no cell
/// centre, so the whole surface becomes null.
pub fn mask_outside(surface: &Raster<f64>, envelope: &Polygon<f64>) -> Result<Raster<f64>> {
    mask_to_geometry(surface, &MultiPolygon(vec![envelope.clone()]))
}

/// Parameters for [`AreaMask`]
#[derive(Debug, Clone, Default)]
pub struct AreaMaskParams {
    pub envelope: Option<Polygon<f64>>,
}

/// Area masker as a pipeline stage
#[derive(Debug, Clone, Default)]
pub struct AreaMask;

impl Algorithm for AreaMask {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AreaMaskParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "AreaMask"
    }

    fn description(&self) -> &'static str {
        "Null surface cells whose centre lies outside an envelope polygon"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        match params.envelope {
            Some(envelope) => mask_outside(&input, &envelope),
            None => Ok(input),
        }
    }
}
