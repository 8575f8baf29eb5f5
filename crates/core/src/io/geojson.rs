//! GeoJSON feature reading
//!
//! Geometries are converted to `geo_types` by hand so that malformed
//! positions produce a `GeoJson` error naming the offending feature.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use std::path::Path;

/// Read a GeoJSON file into a [`FeatureCollection`].
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_features(&text)
}

/// Parse GeoJSON text into a [`FeatureCollection`].
///
/// A `FeatureCollection`, a single `Feature` or a bare geometry are accepted.
/// A legacy `crs` member on the collection is honoured.
pub fn parse_features(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|members| members.get("crs"))
                .map(parse_legacy_crs)
                .transpose()?;

            let features = fc
                .features
                .into_iter()
                .enumerate()
                .map(|(i, f)| convert_feature(f, i))
                .collect::<Result<Vec<_>>>()?;

            Ok(FeatureCollection { features, crs })
        }
        GeoJson::Feature(f) => Ok(std::iter::once(convert_feature(f, 0)?).collect()),
        GeoJson::Geometry(g) => {
            let geometry = convert_value(g.value, 0)?;
            Ok(std::iter::once(Feature::new(geometry)).collect())
        }
    }
}

/// `{"type": "name", "properties": {"name": "EPSG:32722"}}`
fn parse_legacy_crs(value: &serde_json::Value) -> Result<CRS> {
    let name = value
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| Error::GeoJson(format!("unsupported crs member: {}", value)))?;
    CRS::parse(name)
}

fn convert_feature(feature: geojson::Feature, index: usize) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(|g| convert_value(g.value, index))
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        geojson::feature::Id::String(s) => s,
        geojson::feature::Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn convert_value(value: geojson::Value, index: usize) -> Result<Geometry<f64>> {
    use geojson::Value;

    let geometry = match value {
        Value::Point(p) => Geometry::Point(Point(position(&p, index)?)),
        Value::MultiPoint(ps) => Geometry::MultiPoint(MultiPoint(
            ps.iter()
                .map(|p| position(p, index).map(Point))
                .collect::<Result<_>>()?,
        )),
        Value::LineString(line) => Geometry::LineString(line_string(&line, index)?),
        Value::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString(
            lines
                .iter()
                .map(|l| line_string(l, index))
                .collect::<Result<_>>()?,
        )),
        Value::Polygon(rings) => Geometry::Polygon(polygon(&rings, index)?),
        Value::MultiPolygon(polys) => Geometry::MultiPolygon(MultiPolygon(
            polys
                .iter()
                .map(|rings| polygon(rings, index))
                .collect::<Result<_>>()?,
        )),
        Value::GeometryCollection(geoms) => Geometry::GeometryCollection(GeometryCollection(
            geoms
                .into_iter()
                .map(|g| convert_value(g.value, index))
                .collect::<Result<_>>()?,
        )),
    };
    Ok(geometry)
}

fn position(pos: &[f64], index: usize) -> Result<Coord<f64>> {
    match pos {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::GeoJson(format!(
            "feature {}: position needs at least two coordinates, got {}",
            index,
            pos.len()
        ))),
    }
}

fn line_string(coords: &[Vec<f64>], index: usize) -> Result<LineString<f64>> {
    coords
        .iter()
        .map(|p| position(p, index))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>], index: usize) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|r| line_string(r, index));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}
