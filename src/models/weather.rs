//! Current-weather snapshot model

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Which upstream actually supplied a snapshot
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum WeatherSource {
    #[serde(rename = "openweather")]
    Primary,
    #[serde(rename = "open-meteo")]
    Fallback,
}

impl WeatherSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherSource::Primary => "openweather",
            WeatherSource::Fallback => "open-meteo",
        }
    }
}

/// Best-effort current conditions; any measurement may be absent
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Temperature in whole degrees Celsius
    pub temperature_c: Option<i32>,
    pub humidity_pct: Option<u8>,
    /// Precipitation probability, only reported by the fallback provider
    pub rain_chance_pct: Option<u8>,
    /// Wind speed in whole km/h
    pub wind_kph: Option<u32>,
    pub pressure_hpa: Option<u32>,
    pub cloud_pct: Option<u8>,
    /// Visibility in kilometers, one decimal
    pub visibility_km: Option<f64>,
    pub source: WeatherSource,
    pub as_of: DateTime<Utc>,
    /// `as_of` rendered in the configured time zone
    pub as_of_local: String,
    pub locality: Option<String>,
}

impl WeatherSnapshot {
    /// Snapshot with no measurements, stamped now
    #[must_use]
    pub fn empty(source: WeatherSource, timezone: Tz, locality: Option<String>) -> Self {
        let as_of = Utc::now();
        Self {
            temperature_c: None,
            humidity_pct: None,
            rain_chance_pct: None,
            wind_kph: None,
            pressure_hpa: None,
            cloud_pct: None,
            visibility_km: None,
            source,
            as_of,
            as_of_local: format_local(as_of, timezone),
            locality,
        }
    }

    /// True when no measurement at all is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none()
            && self.humidity_pct.is_none()
            && self.rain_chance_pct.is_none()
            && self.wind_kph.is_none()
            && self.pressure_hpa.is_none()
            && self.cloud_pct.is_none()
            && self.visibility_km.is_none()
    }
}

/// Render a timestamp the way the dashboard shows it (`en-IN` style)
#[must_use]
pub fn format_local(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone)
        .format("%d/%m/%Y, %I:%M:%S %P")
        .to_string()
}

/// m/s to whole km/h
#[must_use]
pub fn ms_to_kph(speed_ms: f64) -> Option<u32> {
    let kph = (speed_ms * 3.6).round();
    (kph.is_finite() && kph >= 0.0).then_some(kph as u32)
}

/// Metres to kilometres with one decimal
#[must_use]
pub fn metres_to_km(metres: f64) -> f64 {
    (metres / 1000.0 * 10.0).round() / 10.0
}
