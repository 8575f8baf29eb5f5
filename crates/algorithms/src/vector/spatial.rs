//! Spatial operations: polygon union, bounding box

use geo::{Area, BooleanOps, BoundingRect, LineString, MultiPolygon, Polygon};
use soilmap_core::{Error, Result};
use tracing::debug;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// Bounding box of a multipolygon, `None` when it has no coordinates
pub fn bounding_box(geometry: &MultiPolygon<f64>) -> Option<BoundingBox> {
    geometry.bounding_rect().map(|rect| BoundingBox {
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

fn ring_is_usable(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4 && ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

fn is_usable(polygon: &Polygon<f64>) -> bool {
    ring_is_usable(polygon.exterior())
        && polygon.interiors().iter().all(ring_is_usable)
        && polygon.unsigned_area() > 0.0
}

/// Union of polygons into a single geometry.
///
/// Polygons with non-finite coordinates, fewer than three distinct
/// vertices or zero area are skipped.
///
/// # Errors
/// `Geometry` when no usable polygon remains.
pub fn union_all(polygons: &[Polygon<f64>]) -> Result<MultiPolygon<f64>> {
    let usable: Vec<&Polygon<f64>> = polygons.iter().filter(|p| is_usable(p)).collect();
    let skipped = polygons.len() - usable.len();
    if skipped > 0 {
        debug!(skipped, "ignored unusable boundary polygons");
    }

    let mut iter = usable.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::Geometry("no usable polygon to union".into()))?;

    Ok(iter.fold(MultiPolygon(vec![first.clone()]), |acc, poly| {
        acc.union(&MultiPolygon(vec![poly.clone()]))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
    }

    #[test]
    fn test_union_overlapping() {
        let u = union_all(&[square(0.0, 0.0, 2.0), square(1.0, 0.0, 2.0)]).unwrap();
        assert_eq!(u.0.len(), 1);
        assert_relative_eq!(u.unsigned_area(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_disjoint_keeps_parts() {
        let u = union_all(&[square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).unwrap();
        assert_eq!(u.0.len(), 2);
        assert_relative_eq!(u.unsigned_area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_skips_degenerate() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        let u = union_all(&[flat.clone(), square(0.0, 0.0, 1.0)]).unwrap();
        assert_relative_eq!(u.unsigned_area(), 1.0, epsilon = 1e-9);
        assert!(matches!(union_all(&[flat]), Err(Error::Geometry(_))));
        assert!(union_all(&[]).is_err());
    }

    #[test]
    fn test_bounding_box() {
        let bb = bounding_box(&MultiPolygon(vec![square(1.0, 2.0, 3.0)])).unwrap();
        assert_eq!(bb, BoundingBox::new(1.0, 2.0, 4.0, 5.0));
        assert!(bb.contains_point(2.0, 3.0));
        assert!(bb.intersects(&BoundingBox::new(3.0, 4.0, 9.0, 9.0)));
        assert!(!bb.intersects(&BoundingBox::new(5.0, 0.0, 9.0, 1.0)));
        assert!(bounding_box(&MultiPolygon(vec![])).is_none());
    }
}
