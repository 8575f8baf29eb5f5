//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation between pixel space (col, row) and map space (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up rasters the rotation terms are 0 and `pixel_height` is negative.
/// The same struct also represents the inverse mapping (see [`GeoTransform::inverse`]),
/// in which case `origin_*` are pixel offsets and the scale terms are pixels per map unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform whose `width x height` pixels exactly cover the given bounds.
    pub fn from_bounds(west: f64, south: f64, east: f64, north: f64, width: usize, height: usize) -> Self {
        Self::new(
            west,
            north,
            (east - west) / width as f64,
            -(north - south) / height as f64,
        )
    }

    /// Apply the mapping to fractional pixel coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinates of the center of pixel (col, row)
    #[inline]
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the top-left corner of pixel (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Determinant of the linear part
    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// The inverse mapping (map space to pixel space).
    ///
    /// Returns `None` for degenerate transforms.
    pub fn inverse(&self) -> Option<GeoTransform> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-300 {
            return None;
        }

        let ia = self.pixel_height / det;
        let ib = -self.row_rotation / det;
        let id = -self.col_rotation / det;
        let ie = self.pixel_width / det;

        Some(GeoTransform {
            origin_x: -(ia * self.origin_x + ib * self.origin_y),
            origin_y: -(id * self.origin_x + ie * self.origin_y),
            pixel_width: ia,
            pixel_height: ie,
            row_rotation: ib,
            col_rotation: id,
        })
    }

    /// Fractional pixel coordinates (col, row) of a map position.
    ///
    /// NaN for degenerate transforms.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        match self.inverse() {
            Some(inv) => inv.apply(x, y),
            None => (f64::NAN, f64::NAN),
        }
    }

    /// Integer (row, col) of the pixel containing a map position, floor semantics.
    pub fn rowcol(&self, x: f64, y: f64) -> Option<(isize, isize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if col.is_finite() && row.is_finite() {
            Some((row.floor() as isize, col.floor() as isize))
        } else {
            None
        }
    }

    /// Transform of a window whose top-left pixel is (col_off, row_off) here.
    pub fn window(&self, col_off: usize, row_off: usize) -> GeoTransform {
        let (x, y) = self.pixel_to_geo_corner(col_off, row_off);
        GeoTransform {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }

    /// Absolute product of the x and y scale terms, in squared map units
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Check if this is a north-up image (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_inverse_of_rotated_transform() {
        let gt = GeoTransform {
            origin_x: 10.0,
            origin_y: 50.0,
            pixel_width: 2.0,
            pixel_height: -3.0,
            row_rotation: 0.5,
            col_rotation: 0.25,
        };
        let inv = gt.inverse().unwrap();

        let (x, y) = gt.apply(7.25, 3.5);
        let (col, row) = inv.apply(x, y);
        assert_relative_eq!(col, 7.25, epsilon = 1e-10);
        assert_relative_eq!(row, 3.5, epsilon = 1e-10);

        let back = inv.inverse().unwrap();
        assert_relative_eq!(back.origin_x, gt.origin_x, epsilon = 1e-10);
        assert_relative_eq!(back.pixel_height, gt.pixel_height, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_has_no_inverse() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(gt.inverse().is_none());
        assert!(gt.rowcol(1.0, 1.0).is_none());
    }

    #[test]
    fn test_rowcol_floor() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.rowcol(0.2, 9.9), Some((0, 0)));
        assert_eq!(gt.rowcol(3.7, 4.5), Some((5, 3)));
        assert_eq!(gt.rowcol(-0.5, 10.5), Some((-1, -1)));
    }

    #[test]
    fn test_from_bounds_and_area() {
        let gt = GeoTransform::from_bounds(0.0, 0.0, 100.0, 50.0, 10, 5);
        assert_relative_eq!(gt.pixel_width, 10.0);
        assert_relative_eq!(gt.pixel_height, -10.0);
        assert_relative_eq!(gt.pixel_area(), 100.0);
    }

    #[test]
    fn test_window() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -2.0);
        let w = gt.window(3, 4);
        assert_relative_eq!(w.origin_x, 6.0);
        assert_relative_eq!(w.origin_y, 92.0);
        assert_eq!(w.pixel_to_geo(0, 0), gt.pixel_to_geo(3, 4));
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }
}
