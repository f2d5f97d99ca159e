//! Coordinate Reference System tags
//!
//! The core never transforms coordinates. A CRS is an identity carried
//! alongside a feature collection or raster so that operations combining
//! two inputs can refuse mismatched ones.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
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

    /// Whether two tags name the same reference system.
    ///
    /// EPSG codes are compared when both sides have one, WKT text otherwise.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => matches!((&self.wkt, &other.wkt), (Some(a), Some(b)) if a == b),
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt.char_indices().nth(50).map_or(wkt.len(), |(i, _)| i);
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Fail with [`Error::CrsMismatch`] unless both tags agree.
///
/// Two untagged inputs are compatible; a tagged and an untagged input are not.
pub fn ensure_same_crs(a: Option<&CRS>, b: Option<&CRS>) -> Result<()> {
    match (a, b) {
        (None, None) => Ok(()),
        (Some(x), Some(y)) if x.is_equivalent(y) => Ok(()),
        _ => Err(Error::CrsMismatch(describe(a), describe(b))),
    }
}

fn describe(crs: Option<&CRS>) -> String {
    crs.map_or_else(|| "none".to_string(), CRS::identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(27700);
        assert_eq!(crs.epsg(), Some(27700));
        assert_eq!(crs.identifier(), "EPSG:27700");
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_epsg(2193)));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_wkt("GEOGCS[..]")));
    }

    #[test]
    fn test_ensure_same_crs() {
        let a = CRS::from_epsg(2193);
        assert!(ensure_same_crs(Some(&a), Some(&a.clone())).is_ok());
        assert!(ensure_same_crs(None, None).is_ok());
        assert!(matches!(
            ensure_same_crs(Some(&a), Some(&CRS::wgs84())),
            Err(Error::CrsMismatch(_, _))
        ));
        assert!(matches!(
            ensure_same_crs(Some(&a), None),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
