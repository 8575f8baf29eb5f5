//! Optional TOML configuration file.
//!
//! ```toml
//! [interpolation]
//! use_mask = true
//! compression = "deflate"
//!
//! [interpolation.grid]
//! resolution_m = 20.0
//!
//! [interpolation.estimator]
//! idw_power = 3.0
//! variogram_model = "exponential"
//!
//! [classification]
//! num_classes = 6
//! ```
//!
//! Explicit command-line flags win over values read here.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use soilmap_algorithms::classification::ClassifyParams;
use soilmap_algorithms::interpolation::InterpolationConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub interpolation: InterpolationConfig,
    pub classification: ClassifyParams,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration file")
    }

    /// Read `path`, or the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::parse(&text)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilmap_algorithms::interpolation::VariogramModel;
    use soilmap_core::io::Compression;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = FileConfig::parse(
            "[interpolation]\nuse_mask = true\n\n[interpolation.grid]\nresolution_m = 25.0\n",
        )
        .unwrap();
        assert!(config.interpolation.use_mask);
        assert_eq!(config.interpolation.grid.resolution_m, 25.0);
        assert_eq!(config.interpolation.grid.max_cells, 2000);
        assert_eq!(config.interpolation.estimator.idw_power, 2.0);
        assert_eq!(config.classification.num_classes, 8);
    }

    #[test]
    fn test_full_file() {
        let config = FileConfig::parse(
            r#"
            [interpolation]
            compression = "deflate"
            [interpolation.estimator]
            idw_power = 3.0
            variogram_model = "gaussian"
            [classification]
            num_classes = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.interpolation.compression, Compression::Deflate);
        assert_eq!(config.interpolation.estimator.variogram_model, VariogramModel::Gaussian);
        assert_eq!(config.classification.num_classes, 5);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
        assert_eq!(FileConfig::load(None).unwrap().classification.num_classes, 8);
    }

    #[test]
    fn test_unknown_compression_rejected() {
        assert!(FileConfig::parse("[interpolation]\ncompression = \"zstd\"\n").is_err());
    }
}
