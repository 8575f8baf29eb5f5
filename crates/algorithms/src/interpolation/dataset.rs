//! Point dataset: validated sample locations with loosely typed attributes

use std::collections::{BTreeSet, HashMap};

use geo::{ConvexHull, Geometry, MultiPoint, Point, Polygon};
use soilmap_core::vector::try_parse_numeric;
use soilmap_core::{AttributeValue, Error, FeatureCollection, Result, CRS};
use tracing::{debug, info};

use super::SamplePoint;

/// Minimum number of valid values an attribute needs to be interpolated
pub const MIN_VALID_SAMPLES: usize = 3;

/// Axis-aligned bounding box (min_x, min_y, max_x, max_y)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest extent containing all points, `None` for an empty iterator
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc: Option<Extent>, (x, y)| {
            Some(match acc {
                None => Extent::new(x, y, x, y),
                Some(e) => Extent::new(e.min_x.min(x), e.min_y.min(y), e.max_x.max(x), e.max_y.max(y)),
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// One sample location and its raw properties
#[derive(Debug, Clone)]
pub struct SampleSite {
    pub location: Point<f64>,
    pub properties: HashMap<String, AttributeValue>,
}

/// Sample sites sharing one CRS, with their extent and convex envelope.
///
/// Built once per interpolation request from point features; only features
/// whose geometry is a `Point` with finite coordinates are kept.
#[derive(Debug, Clone)]
pub struct PointDataset {
    sites: Vec<SampleSite>,
    crs: CRS,
    extent: Extent,
    envelope: Polygon<f64>,
}

impl PointDataset {
    /// Build a dataset from a feature collection.
    ///
    /// # Errors
    /// `Validation` if the collection holds no usable point geometry.
    pub fn from_features(features: &FeatureCollection) -> Result<Self> {
        let sites: Vec<SampleSite> = features
            .iter()
            .filter_map(|f| match &f.geometry {
                Some(Geometry::Point(p)) if p.x().is_finite() && p.y().is_finite() => Some(SampleSite {
                    location: *p,
                    properties: f.properties.clone(),
                }),
                _ => None,
            })
            .collect();

        if sites.is_empty() {
            return Err(Error::Validation(format!(
                "no point geometries among {} features",
                features.len()
            )));
        }

        let skipped = features.len() - sites.len();
        if skipped > 0 {
            debug!(skipped, kept = sites.len(), "ignored features without point geometry");
        }

        let extent = Extent::from_points(sites.iter().map(|s| (s.location.x(), s.location.y())))
            .ok_or_else(|| Error::Validation("no point geometries".into()))?;

        let hull_input: MultiPoint<f64> = sites.iter().map(|s| s.location).collect();
        let envelope = hull_input.convex_hull();

        Ok(Self {
            sites,
            crs: features.crs_or_wgs84(),
            extent,
            envelope,
        })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> &[SampleSite] {
        &self.sites
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Extent of every site, valid attribute value or not
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Convex hull of every site
    pub fn envelope(&self) -> &Polygon<f64> {
        &self.envelope
    }

    /// Sorted union of property names over all sites
    pub fn attribute_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.sites.iter().flat_map(|s| s.properties.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Samples with a numeric value for `attribute`.
    ///
    /// # Errors
    /// `Validation` when no site carries the attribute, or fewer than
    /// three sites have a value that parses as a finite number.
    pub fn samples(&self, attribute: &str) -> Result<Vec<SamplePoint>> {
        if !self.sites.iter().any(|s| s.properties.contains_key(attribute)) {
            return Err(Error::Validation(format!(
                "attribute '{}' not found in dataset",
                attribute
            )));
        }

        let samples: Vec<SamplePoint> = self
            .sites
            .iter()
            .filter_map(|s| {
                let value = s.properties.get(attribute).and_then(try_parse_numeric)?;
                Some(SamplePoint::new(s.location.x(), s.location.y(), value))
            })
            .collect();

        let total = self.sites.len();
        let valid = samples.len();
        let used_pct = 100.0 * valid as f64 / total as f64;
        info!(parameter = attribute, total, valid, used_pct, "sample points");

        if valid < MIN_VALID_SAMPLES {
            return Err(Error::Validation(format!(
                "attribute '{}' has {} valid values, at least {} required",
                attribute, valid, MIN_VALID_SAMPLES
            )));
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, LineString};
    use soilmap_core::Feature;

    fn point_feature(x: f64, y: f64, props: &[(&str, AttributeValue)]) -> Feature {
        props.iter().fold(Feature::new(Geometry::Point(Point::new(x, y))), |f, (k, v)| {
            f.with_property(*k, v.clone())
        })
    }

    fn field() -> FeatureCollection {
        vec![
            point_feature(0.0, 0.0, &[("ph", AttributeValue::Float(5.5)), ("k", AttributeValue::Int(120))]),
            point_feature(1.0, 0.0, &[("ph", AttributeValue::String(" 6.1 ".into()))]),
            point_feature(1.0, 1.0, &[("ph", AttributeValue::String("n/a".into()))]),
            point_feature(0.0, 1.0, &[("ph", AttributeValue::Float(6.4)), ("k", AttributeValue::Null)]),
            point_feature(0.5, 0.5, &[("ph", AttributeValue::Bool(true))]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_extent_and_envelope() {
        let ds = PointDataset::from_features(&field()).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.extent(), Extent::new(0.0, 0.0, 1.0, 1.0));
        assert!(ds.envelope().contains(&Point::new(0.25, 0.75)));
        assert!(!ds.envelope().contains(&Point::new(1.5, 0.5)));
        assert!(ds.crs().is_wgs84());
    }

    #[test]
    fn test_samples_coerce_values() {
        let ds = PointDataset::from_features(&field()).unwrap();
        let ph = ds.samples("ph").unwrap();
        // "n/a" and the boolean are excluded
        assert_eq!(ph.len(), 3);
        assert_eq!(ph[1], SamplePoint::new(1.0, 0.0, 6.1));
    }

    #[test]
    fn test_too_few_valid_values() {
        let ds = PointDataset::from_features(&field()).unwrap();
        let err = ds.samples("k").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_attribute() {
        let ds = PointDataset::from_features(&field()).unwrap();
        assert!(matches!(ds.samples("zinc"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_no_points_fails() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        let fc: FeatureCollection = vec![Feature::new(line), Feature::empty()].into_iter().collect();
        assert!(matches!(PointDataset::from_features(&fc), Err(Error::Validation(_))));
    }

    #[test]
    fn test_attribute_names_sorted_union() {
        let ds = PointDataset::from_features(&field()).unwrap();
        assert_eq!(ds.attribute_names(), vec!["k".to_string(), "ph".to_string()]);
    }
}
