//! Regular lon/lat lattice covering a buffered point extent

use serde::{Deserialize, Serialize};
use soilmap_core::{Error, GeoTransform, Raster, Result, CRS};
use tracing::debug;

use super::Extent;

/// Ground distance of one degree, used uniformly for both axes
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Margin added on each side, as a fraction of the larger axis span
const BUFFER_FRACTION: f64 = 0.2;
/// Smallest margin in degrees
const MIN_BUFFER_DEG: f64 = 0.001;

/// Parameters for [`build_grid`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Target cell size in meters (default 10)
    pub resolution_m: f64,
    /// Floor on cells per axis (default 100)
    pub min_cells: usize,
    /// Ceiling on cells per axis (default 2000)
    pub max_cells: usize,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            resolution_m: 10.0,
            min_cells: 100,
            max_cells: 2000,
        }
    }
}

/// Cell-centre axes of the interpolation lattice.
///
/// `xs` ascend west to east; `ys` descend north to south, so row 0 is the
/// northern edge and `transform.pixel_to_geo(col, row) == (xs[col], ys[row])`.
#[derive(Debug, Clone)]
pub struct InterpolationGrid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub transform: GeoTransform,
    /// Buffered bounds the axes span, inclusive
    pub extent: Extent,
}

impl InterpolationGrid {
    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wrap row-major cell values into a georeferenced WGS84 raster
    pub fn raster(&self, data: Vec<f64>) -> Result<Raster<f64>> {
        let mut raster = Raster::from_vec(data, self.rows(), self.cols())?
            .georeferenced(self.transform, Some(CRS::wgs84()));
        raster.set_nodata(Some(f64::NAN));
        Ok(raster)
    }

    /// A raster with every cell set to `value`
    pub fn filled(&self, value: f64) -> Result<Raster<f64>> {
        self.raster(vec![value; self.len()])
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

fn cells_for(range: f64, resolution_deg: f64, params: &GridParams) -> usize {
    // `as` saturates, so a huge ratio lands on max_cells
    let raw = (range / resolution_deg) as usize;
    raw.max(params.min_cells).min(params.max_cells)
}

/// Build the interpolation grid for a point extent.
///
/// The extent is enlarged on every side by
/// `max(0.2 * max(width, height), 0.001)` degrees. The requested
/// resolution is converted with [`METERS_PER_DEGREE`] and the resulting
/// cell count per axis is clamped to `[min_cells, max_cells]`.
///
/// # Errors
/// `InvalidParameter` for a non-positive resolution or inconsistent cell bounds.
pub fn build_grid(extent: &Extent, params: &GridParams) -> Result<InterpolationGrid> {
    if !(params.resolution_m.is_finite() && params.resolution_m > 0.0) {
        return Err(Error::InvalidParameter {
            name: "resolution_m",
            value: params.resolution_m.to_string(),
            reason: "must be a positive number of meters".into(),
        });
    }
    if params.min_cells < 2 {
        return Err(Error::InvalidParameter {
            name: "min_cells",
            value: params.min_cells.to_string(),
            reason: "at least 2 cells per axis are required".into(),
        });
    }
    if params.min_cells > params.max_cells {
        return Err(Error::InvalidParameter {
            name: "max_cells",
            value: params.max_cells.to_string(),
            reason: format!("must not be below min_cells ({})", params.min_cells),
        });
    }

    let buffer = (BUFFER_FRACTION * extent.width().max(extent.height())).max(MIN_BUFFER_DEG);
    let expanded = Extent::new(
        extent.min_x - buffer,
        extent.min_y - buffer,
        extent.max_x + buffer,
        extent.max_y + buffer,
    );

    let resolution_deg = params.resolution_m / METERS_PER_DEGREE;
    let nx = cells_for(expanded.width(), resolution_deg, params);
    let ny = cells_for(expanded.height(), resolution_deg, params);

    let xs = linspace(expanded.min_x, expanded.max_x, nx);
    let mut ys = linspace(expanded.min_y, expanded.max_y, ny);
    ys.reverse();

    // Cell centres sit on the linspace nodes: step is range / (n - 1) and the
    // raster reaches half a cell past the buffered extent on each side.
    let step_x = expanded.width() / (nx - 1) as f64;
    let step_y = expanded.height() / (ny - 1) as f64;
    let transform = GeoTransform::new(
        expanded.min_x - step_x / 2.0,
        expanded.max_y + step_y / 2.0,
        step_x,
        -step_y,
    );

    debug!(cols = nx, rows = ny, buffer, resolution_deg, "grid built");

    Ok(InterpolationGrid {
        xs,
        ys,
        transform,
        extent: expanded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn field_extent() -> Extent {
        // Roughly 1.1 km x 0.55 km
        Extent::new(-58.50, -34.61, -58.49, -34.605)
    }

    #[test]
    fn test_buffer_and_counts() {
        let grid = build_grid(&field_extent(), &GridParams::default()).unwrap();
        // buffer = 0.2 * 0.01 = 0.002 on each side
        assert_relative_eq!(grid.extent.min_x, -58.502, epsilon = 1e-12);
        assert_relative_eq!(grid.extent.max_y, -34.603, epsilon = 1e-12);
        // 0.014 deg / (10 m / 111320) = 155.8 -> 155
        assert_eq!(grid.cols(), 155);
        // 0.009 deg -> 100.188 -> 100
        assert_eq!(grid.rows(), 100);
    }

    #[test]
    fn test_axes_orientation_and_transform() {
        let grid = build_grid(&field_extent(), &GridParams::default()).unwrap();
        assert!(grid.xs.windows(2).all(|w| w[0] < w[1]));
        assert!(grid.ys.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(grid.xs[0], grid.extent.min_x);
        assert_eq!(*grid.xs.last().unwrap(), grid.extent.max_x);
        assert_eq!(grid.ys[0], grid.extent.max_y);

        for &(col, row) in &[(0, 0), (17, 42), (grid.cols() - 1, grid.rows() - 1)] {
            let (x, y) = grid.transform.pixel_to_geo(col, row);
            assert_relative_eq!(x, grid.xs[col], epsilon = 1e-9);
            assert_relative_eq!(y, grid.ys[row], epsilon = 1e-9);
        }
        assert!(grid.transform.is_north_up());
    }

    #[test]
    fn test_raster_reaches_half_cell_past_extent() {
        let grid = build_grid(&field_extent(), &GridParams::default()).unwrap();
        let step_x = grid.extent.width() / (grid.cols() - 1) as f64;
        let step_y = grid.extent.height() / (grid.rows() - 1) as f64;
        let (min_x, min_y, max_x, max_y) = grid.transform.bounds(grid.cols(), grid.rows());

        assert_relative_eq!(min_x, grid.extent.min_x - step_x / 2.0, epsilon = 1e-12);
        assert_relative_eq!(max_x, grid.extent.max_x + step_x / 2.0, epsilon = 1e-12);
        assert_relative_eq!(min_y, grid.extent.min_y - step_y / 2.0, epsilon = 1e-12);
        assert_relative_eq!(max_y, grid.extent.max_y + step_y / 2.0, epsilon = 1e-12);
        assert_relative_eq!(grid.transform.pixel_area(), step_x * step_y, epsilon = 1e-18);
    }

    #[test]
    fn test_counts_clamped_for_degenerate_extents() {
        let single = Extent::new(10.0, 10.0, 10.0, 10.0);
        let grid = build_grid(&single, &GridParams { resolution_m: 5000.0, ..Default::default() }).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (100, 100));
        assert_relative_eq!(grid.extent.width(), 0.002, epsilon = 1e-12);

        let continent = Extent::new(-70.0, -40.0, -50.0, -20.0);
        let grid = build_grid(&continent, &GridParams { resolution_m: 1.0, ..Default::default() }).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2000, 2000));
    }

    #[test]
    fn test_invalid_params() {
        let e = field_extent();
        for params in [
            GridParams { resolution_m: 0.0, ..Default::default() },
            GridParams { resolution_m: f64::NAN, ..Default::default() },
            GridParams { min_cells: 1, ..Default::default() },
            GridParams { min_cells: 500, max_cells: 400, ..Default::default() },
        ] {
            assert!(matches!(build_grid(&e, &params), Err(Error::InvalidParameter { .. })));
        }
    }

    #[test]
    fn test_raster_wrapping() {
        let grid = build_grid(&field_extent(), &GridParams::default()).unwrap();
        let r = grid.filled(3.0).unwrap();
        assert_eq!(r.shape(), (grid.rows(), grid.cols()));
        assert!(r.crs().unwrap().is_wgs84());
        assert!(grid.raster(vec![0.0; 3]).is_err());
    }
}
