//! Cell-centre containment against polygons
//!
//! Uses the even-odd rule over every ring of the geometry, so holes and
//! disjoint parts need no special casing. For north-up grids each row is
//! one horizontal scanline: the ring crossings are computed once per row
//! and every cell centre is classified by a binary search over them.

use crate::maybe_rayon::*;
use geo::{Coord, LineString, MultiPolygon};
use ndarray::Array2;
use soilmap_core::{Error, GeoTransform, Result};

fn rings(geometry: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    geometry
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
}

/// Ring edges as coordinate pairs, closing rings that are left open
fn edges(geometry: &MultiPolygon<f64>) -> Vec<(Coord<f64>, Coord<f64>)> {
    let mut out = Vec::new();
    for ring in rings(geometry) {
        let coords = &ring.0;
        if coords.len() < 2 {
            continue;
        }
        out.extend(coords.windows(2).map(|w| (w[0], w[1])));
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last {
                out.push((last, first));
            }
        }
    }
    out
}

/// X positions where the horizontal line at `y` crosses an edge, sorted
fn crossings(edges: &[(Coord<f64>, Coord<f64>)], y: f64) -> Vec<f64> {
    let mut xs: Vec<f64> = edges
        .iter()
        .filter(|(p, q)| (p.y > y) != (q.y > y))
        .map(|(p, q)| p.x + (y - p.y) * (q.x - p.x) / (q.y - p.y))
        .collect();
    xs.sort_by(f64::total_cmp);
    xs
}

fn inside(crossings: &[f64], x: f64) -> bool {
    crossings.partition_point(|&c| c < x) % 2 == 1
}

/// Even-odd test of a single point against every ring of the geometry.
pub fn contains_point(geometry: &MultiPolygon<f64>, x: f64, y: f64) -> bool {
    inside(&crossings(&edges(geometry), y), x)
}

/// Boolean grid marking cells whose centre lies inside `geometry`.
///
/// Rows are evaluated in parallel; the result does not depend on the
/// thread count.
pub fn polygon_mask(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    geometry: &MultiPolygon<f64>,
) -> Result<Array2<bool>> {
    let edges = edges(geometry);
    let north_up = transform.row_rotation == 0.0 && transform.col_rotation == 0.0;

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            if north_up {
                let (_, y) = transform.pixel_to_geo(0, row);
                let xs = crossings(&edges, y);
                (0..cols)
                    .map(|col| !xs.is_empty() && inside(&xs, transform.pixel_to_geo(col, row).0))
                    .collect::<Vec<bool>>()
            } else {
                (0..cols)
                    .map(|col| {
                        let (x, y) = transform.pixel_to_geo(col, row);
                        inside(&crossings(&edges, y), x)
                    })
                    .collect::<Vec<bool>>()
            }
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}
