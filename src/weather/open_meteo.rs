//! Open-Meteo forecast API, `current` block only (no API key)

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;

use super::{WeatherProvider, to_percent, to_whole};
use crate::Result;
use crate::config::WeatherConfig;
use crate::http;
use crate::models::weather::{format_local, metres_to_km, ms_to_kph};
use crate::models::{Coordinate, WeatherSnapshot, WeatherSource};

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation_probability,pressure_msl,cloud_cover,visibility";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentData>,
}

/// Every field may be missing depending on the model run
#[derive(Debug, Default, Deserialize)]
struct CurrentData {
    #[serde(rename = "temperature_2m")]
    temperature: Option<f64>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<f64>,
    /// m/s, requested with `wind_speed_unit=ms`
    #[serde(rename = "wind_speed_10m")]
    wind_speed: Option<f64>,
    precipitation_probability: Option<f64>,
    #[serde(rename = "pressure_msl")]
    pressure: Option<f64>,
    cloud_cover: Option<f64>,
    /// Metres
    visibility: Option<f64>,
}

pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    timezone: Tz,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, config: &WeatherConfig, timezone: Tz) -> Self {
        Self {
            client,
            base_url: config.fallback_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            timezone,
        }
    }

    fn to_snapshot(&self, current: CurrentData) -> WeatherSnapshot {
        let as_of = Utc::now();
        WeatherSnapshot {
            temperature_c: current.temperature.and_then(to_whole),
            humidity_pct: current.humidity.and_then(to_percent),
            rain_chance_pct: current.precipitation_probability.and_then(to_percent),
            wind_kph: current.wind_speed.and_then(ms_to_kph),
            pressure_hpa: current
                .pressure
                .and_then(to_whole)
                .and_then(|p| u32::try_from(p).ok()),
            cloud_pct: current.cloud_cover.and_then(to_percent),
            visibility_km: current.visibility.map(metres_to_km),
            source: WeatherSource::Fallback,
            as_of,
            as_of_local: format_local(as_of, self.timezone),
            locality: None,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn source(&self) -> WeatherSource {
        WeatherSource::Fallback
    }

    async fn current(&self, coordinate: Coordinate) -> Result<WeatherSnapshot> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&current={CURRENT_FIELDS}&timezone={}&wind_speed_unit=ms&models=best_match",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            urlencoding::encode(self.timezone.name())
        );
        let response: ForecastResponse =
            http::fetch_json(self.client.get(url), "open-meteo current", self.timeout).await?;
        Ok(self.to_snapshot(response.current.unwrap_or_default()))
    }
}
