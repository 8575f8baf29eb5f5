//! Boundary outline in pixel space

use geo::MultiPolygon;
use soilmap_core::GeoTransform;

/// Rings of `geometry` as `(col, row)` pixel indices of a `rows x cols` raster.
///
/// Every exterior and interior ring becomes one sequence. Vertices that
/// map outside the raster are dropped, and rings left with no vertex are
/// omitted.
pub fn outline_rings(
    geometry: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Vec<Vec<(usize, usize)>> {
    let rings = geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()));

    rings
        .map(|ring| {
            ring.0
                .iter()
                .filter_map(|c| transform.rowcol(c.x, c.y))
                .filter(|&(row, col)| row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols)
                .map(|(row, col)| (col as usize, row as usize))
                .collect::<Vec<_>>()
        })
        .filter(|ring| !ring.is_empty())
        .collect()
}
