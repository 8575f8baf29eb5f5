//! I/O for surfaces (GeoTIFF) and point/boundary features (GeoJSON)

mod geojson;
mod native;

pub use self::geojson::{parse_features, read_features};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, Compression,
    GeoTiffOptions,
};
