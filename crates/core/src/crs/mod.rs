//! Coordinate Reference System handling

mod reproject;

pub use reproject::{parse_utm_epsg, transform_point, utm_to_wgs84, wgs84_to_utm};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse an authority string.
    ///
    /// Accepts `EPSG:32722`, `epsg:4326`, the OGC URN forms
    /// (`urn:ogc:def:crs:EPSG::32722`, `urn:ogc:def:crs:OGC:1.3:CRS84`)
    /// and a bare integer code.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let upper = text.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self::wgs84());
        }

        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.starts_with("EPSG:") || upper.starts_with("URN:OGC:DEF:CRS:EPSG:") || !upper.contains(':'))
            .and_then(|c| c.parse::<u32>().ok());

        match code {
            Some(code) => Ok(Self::from_epsg(code)),
            None => Err(Error::Crs(format!("unrecognised CRS identifier '{}'", text))),
        }
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether this is geographic WGS84 (EPSG:4326)
    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Imperfect, but WKT is only ever carried through untouched
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_wgs84());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(32722)));
    }

    #[test]
    fn test_parse_authority_strings() {
        assert_eq!(CRS::parse("EPSG:32722").unwrap().epsg(), Some(32722));
        assert_eq!(CRS::parse("epsg:4326").unwrap().epsg(), Some(4326));
        assert_eq!(
            CRS::parse("urn:ogc:def:crs:EPSG::31983").unwrap().epsg(),
            Some(31983)
        );
        assert!(CRS::parse("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap().is_wgs84());
        assert_eq!(CRS::parse(" 4674 ").unwrap().epsg(), Some(4674));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CRS::parse("mercator").is_err());
        assert!(CRS::parse("ESRI:102100").is_err());
        assert!(CRS::parse("").is_err());
    }
}
