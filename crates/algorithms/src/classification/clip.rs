//! Boundary clipping: reprojection, union, crop and exact containment

use std::path::Path;

use geo::{Area, Centroid, Coord, Geometry, MapCoords, MultiPolygon, Polygon};
use soilmap_core::crs::transform_point;
use soilmap_core::io::read_features;
use soilmap_core::{Error, FeatureCollection, Raster, Result, CRS};
use tracing::debug;

use crate::interpolation::METERS_PER_DEGREE;
use crate::mask::mask_to_geometry;
use crate::vector::{bounding_box, union_all};

/// Study-area boundary: polygon parts in their own CRS, not yet unioned
#[derive(Debug, Clone)]
pub struct Boundary {
    pub polygons: MultiPolygon<f64>,
    pub crs: CRS,
}

impl Boundary {
    pub fn new(polygons: MultiPolygon<f64>, crs: CRS) -> Self {
        Self { polygons, crs }
    }

    /// Collect the polygon and multipolygon geometries of a feature collection.
    ///
    /// # Errors
    /// `Geometry` when the collection has no polygonal feature.
    pub fn from_features(features: &FeatureCollection) -> Result<Self> {
        let mut parts: Vec<Polygon<f64>> = Vec::new();
        for feature in features.iter() {
            match &feature.geometry {
                Some(Geometry::Polygon(p)) => parts.push(p.clone()),
                Some(Geometry::MultiPolygon(mp)) => parts.extend(mp.0.iter().cloned()),
                _ => {}
            }
        }

        if parts.is_empty() {
            return Err(Error::Geometry("boundary has no polygon features".into()));
        }

        Ok(Self::new(MultiPolygon(parts), features.crs_or_wgs84()))
    }

    /// Read a GeoJSON boundary file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_features(&read_features(path)?)
    }

    /// Dissolved area in hectares, rounded to two decimals.
    ///
    /// Measured in WGS84 degrees squared and scaled by 111 320 m per degree
    /// of latitude and `111 320 * cos(lat)` per degree of longitude at the
    /// mean centroid latitude of the parts.
    pub fn area_hectares(&self) -> Result<f64> {
        let dissolved = prepare_boundary(self, &CRS::wgs84())?;
        let centroids: Vec<f64> = dissolved.0.iter().filter_map(|p| p.centroid()).map(|c| c.y()).collect();
        if centroids.is_empty() {
            return Err(Error::Geometry("boundary has no area".into()));
        }
        let lat = centroids.iter().sum::<f64>() / centroids.len() as f64;

        let area_deg2 = dissolved.unsigned_area();
        let area_m2 = area_deg2 * METERS_PER_DEGREE * METERS_PER_DEGREE * lat.to_radians().cos();
        Ok((area_m2 / 10_000.0 * 100.0).round() / 100.0)
    }
}

/// Reproject the boundary into `target` (when needed) and union its parts.
pub fn prepare_boundary(boundary: &Boundary, target: &CRS) -> Result<MultiPolygon<f64>> {
    let polygons = if boundary.crs.is_equivalent(target) {
        boundary.polygons.clone()
    } else {
        debug!(from = %boundary.crs, to = %target, "reprojecting boundary");
        boundary.polygons.try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = transform_point(c.x, c.y, &boundary.crs, target)?;
            Ok(Coord { x, y })
        })?
    };

    union_all(&polygons.0)
}

/// Crop `surface` to the bounding box of `geometry`, then null every cell
/// whose centre lies outside it.
///
/// # Errors
/// `Geometry` when the geometry is empty, does not overlap the raster, or
/// contains none of the cropped cell centres.
pub fn clip_to_geometry(surface: &Raster<f64>, geometry: &MultiPolygon<f64>) -> Result<Raster<f64>> {
    let bbox = bounding_box(geometry).ok_or_else(|| Error::Geometry("boundary is empty".into()))?;
    let inverse = surface
        .transform()
        .inverse()
        .ok_or_else(|| Error::Geometry("raster transform is not invertible".into()))?;

    let corners = [
        inverse.apply(bbox.min_x, bbox.min_y),
        inverse.apply(bbox.min_x, bbox.max_y),
        inverse.apply(bbox.max_x, bbox.min_y),
        inverse.apply(bbox.max_x, bbox.max_y),
    ];
    let (c0, r0, c1, r1) = corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(c0, r0, c1, r1), &(c, r)| (c0.min(c), r0.min(r), c1.max(c), r1.max(r)),
    );

    let (rows, cols) = surface.shape();
    let col_start = c0.floor().max(0.0);
    let row_start = r0.floor().max(0.0);
    let col_end = c1.ceil().min(cols as f64);
    let row_end = r1.ceil().min(rows as f64);
    if !(col_end > col_start && row_end > row_start) {
        return Err(Error::Geometry("boundary does not overlap the raster".into()));
    }

    let (col_off, row_off) = (col_start as usize, row_start as usize);
    let window = surface.crop(
        row_off,
        col_off,
        row_end as usize - row_off,
        col_end as usize - col_off,
    )?;

    let clipped = mask_to_geometry(&window, geometry)?;
    if clipped.valid_count() == 0 && window.valid_count() > 0 {
        return Err(Error::Geometry("no cell centre lies inside the boundary".into()));
    }

    debug!(
        rows = clipped.rows(),
        cols = clipped.cols(),
        row_off,
        col_off,
        valid = clipped.valid_count(),
        "surface clipped to boundary"
    );
    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;
    use soilmap_core::{Feature, GeoTransform};

    fn surface() -> Raster<f64> {
        let mut r = Raster::filled(20, 20, 1.0)
            .georeferenced(GeoTransform::new(0.0, 20.0, 1.0, -1.0), Some(CRS::wgs84()));
        r.set_nodata(Some(f64::NAN));
        r
    }

    fn triangle() -> Polygon<f64> {
        polygon![(x: -58.505, y: -34.605), (x: -58.495, y: -34.605), (x: -58.505, y: -34.595)]
    }

    #[test]
    fn test_crop_and_exact_containment() {
        let right_triangle = polygon![(x: 5.0, y: 5.0), (x: 15.0, y: 5.0), (x: 5.0, y: 15.0)];
        let clipped = clip_to_geometry(&surface(), &MultiPolygon(vec![right_triangle])).unwrap();
        assert_eq!(clipped.shape(), (10, 10));
        assert_eq!(clipped.pixel_to_geo(0, 0), (5.5, 14.5));

        // Bottom-left of the crop is the right angle, top-right is outside
        assert_eq!(clipped.get(9, 0).unwrap(), 1.0);
        assert!(clipped.get(0, 9).unwrap().is_nan());
        // 45 centres strictly inside plus at most the 10 on the hypotenuse
        let valid = clipped.valid_count();
        assert!((45..=55).contains(&valid), "valid = {}", valid);
    }

    #[test]
    fn test_outside_boundary_fails() {
        let far = polygon![(x: 100.0, y: 100.0), (x: 101.0, y: 100.0), (x: 101.0, y: 101.0), (x: 100.0, y: 101.0)];
        let result = clip_to_geometry(&surface(), &MultiPolygon(vec![far]));
        assert!(matches!(result, Err(Error::Geometry(_))));
    }

    #[test]
    fn test_prepare_reprojects_from_utm() {
        // Triangle corners projected to UTM 21S and back
        let wgs = triangle();
        let utm_crs = CRS::from_epsg(32721);
        let utm = wgs
            .try_map_coords(|c: Coord<f64>| -> Result<Coord<f64>> {
                let (x, y) = transform_point(c.x, c.y, &CRS::wgs84(), &utm_crs)?;
                Ok(Coord { x, y })
            })
            .unwrap();

        let boundary = Boundary::new(MultiPolygon(vec![utm]), utm_crs);
        let geom = prepare_boundary(&boundary, &CRS::wgs84()).unwrap();
        let bbox = bounding_box(&geom).unwrap();
        assert!((bbox.min_x + 58.505).abs() < 1e-6);
        assert!((bbox.max_y + 34.595).abs() < 1e-6);
    }

    fn square(cx: f64, cy: f64, half: f64) -> Polygon<f64> {
        polygon![
            (x: cx - half, y: cy - half),
            (x: cx + half, y: cy - half),
            (x: cx + half, y: cy + half),
            (x: cx - half, y: cy + half),
        ]
    }

    #[test]
    fn test_area_hectares_scales_with_latitude() {
        // 0.01 x 0.01 degrees; 111320^2 * 1e-4 m2 at the equator
        let equator = Boundary::new(MultiPolygon(vec![square(-58.0, 0.0, 0.005)]), CRS::wgs84());
        assert_relative_eq!(equator.area_hectares().unwrap(), 123.92);

        let north = Boundary::new(MultiPolygon(vec![square(-58.0, 60.0, 0.005)]), CRS::wgs84());
        assert_relative_eq!(north.area_hectares().unwrap(), 61.96);
    }

    #[test]
    fn test_area_hectares_dissolves_overlap() {
        // Two 0.01 degree squares sharing half their width: 0.015 x 0.01 degrees
        let a = square(-58.0, 0.0, 0.005);
        let b = square(-57.995, 0.0, 0.005);
        let boundary = Boundary::new(MultiPolygon(vec![a, b]), CRS::wgs84());
        assert_relative_eq!(boundary.area_hectares().unwrap(), 185.88, epsilon = 0.011);
    }

    #[test]
    fn test_area_hectares_from_utm() {
        // 1 km square in UTM 21S is close to 100 ha
        let (x, y) = transform_point(-57.0, -34.6, &CRS::wgs84(), &CRS::from_epsg(32721)).unwrap();
        let boundary = Boundary::new(MultiPolygon(vec![square(x, y, 500.0)]), CRS::from_epsg(32721));
        let area = boundary.area_hectares().unwrap();
        assert!((area - 100.0).abs() < 1.5, "area = {}", area);
    }

    #[test]
    fn test_unsupported_crs_fails() {
        let boundary = Boundary::new(MultiPolygon(vec![triangle()]), CRS::from_epsg(3857));
        assert!(prepare_boundary(&boundary, &CRS::wgs84()).is_err());
    }

    #[test]
    fn test_from_features_collects_polygons() {
        let fc: FeatureCollection = vec![
            Feature::new(Geometry::Polygon(triangle())),
            Feature::new(Geometry::Point(geo::Point::new(0.0, 0.0))),
        ]
        .into_iter()
        .collect();
        let b = Boundary::from_features(&fc).unwrap();
        assert_eq!(b.polygons.0.len(), 1);
        assert!(b.crs.is_wgs84());

        let points_only: FeatureCollection =
            vec![Feature::new(Geometry::Point(geo::Point::new(0.0, 0.0)))].into_iter().collect();
        assert!(Boundary::from_features(&points_only).is_err());
    }
}
