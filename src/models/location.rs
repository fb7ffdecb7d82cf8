//! Coordinate model and cache-key rounding

use serde::{Deserialize, Serialize};

use crate::FieldSenseError;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Which acquisition tier produced a coordinate
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateOrigin {
    Cached,
    Live,
    Fallback,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the WGS84 range
    pub fn new(latitude: f64, longitude: f64) -> crate::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FieldSenseError::validation(format!(
                "latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FieldSenseError::validation(format!(
                "longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Format coordinate as a display string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Address cache key, about 100 m resolution
    #[must_use]
    pub fn address_key(&self) -> String {
        let (lat, lon) = self.rounded_coordinates(3);
        format!("address:{lat:.3}:{lon:.3}")
    }

    /// Weather cache key for a locality around this coordinate
    #[must_use]
    pub fn weather_key(&self, locality: &str) -> String {
        let (lat, lon) = self.rounded_coordinates(2);
        format!("weather:{}:{lat:.2}:{lon:.2}", locality.trim().to_lowercase())
    }
}
