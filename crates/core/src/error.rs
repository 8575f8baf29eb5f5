//! Error types for soilmap

use thiserror::Error;

/// Main error type for soilmap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Malformed or insufficient input. Always surfaced to the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An estimator could not produce a surface; the engine moves on to the next one.
    #[error("Estimation failed: {0}")]
    Estimation(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("CRS error: {0}")]
    Crs(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error comes from reading or writing an artefact.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Tiff(_))
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for soilmap operations
pub type Result<T> = std::result::Result<T, Error>;
