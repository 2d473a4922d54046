//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation.
///
/// Backscatter frames arrive on a geographic grid, so the common case is
/// EPSG:4326; WKT and PROJ forms are carried through untouched when a
/// source file provides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    epsg: Option<u32>,
    wkt: Option<String>,
    proj: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
            proj: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326), the default for backscatter stacks
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether the CRS is geographic lon/lat on WGS84.
    ///
    /// Centroid drift distances are only meaningful on such a grid.
    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = Crs::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = Crs::from_epsg(4326);
        let b = Crs::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&Crs::from_epsg(3857)));
    }
}
