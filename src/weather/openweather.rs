//! OpenWeather current-weather provider (needs an API key)

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

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: Option<MainBlock>,
    wind: Option<WindBlock>,
    clouds: Option<CloudBlock>,
    /// Metres
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    /// m/s with `units=metric`
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CloudBlock {
    all: Option<f64>,
}

pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    timezone: Tz,
}

impl OpenWeatherProvider {
    pub fn new(client: Client, api_key: String, config: &WeatherConfig, timezone: Tz) -> Self {
        Self {
            client,
            api_key,
            base_url: config.primary_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            timezone,
        }
    }

    fn to_snapshot(&self, response: CurrentWeatherResponse) -> WeatherSnapshot {
        let main = response.main.as_ref();
        let as_of = Utc::now();
        WeatherSnapshot {
            temperature_c: main.and_then(|m| m.temp).and_then(to_whole),
            humidity_pct: main.and_then(|m| m.humidity).and_then(to_percent),
            rain_chance_pct: None,
            wind_kph: response.wind.and_then(|w| w.speed).and_then(ms_to_kph),
            pressure_hpa: main
                .and_then(|m| m.pressure)
                .and_then(to_whole)
                .and_then(|p| u32::try_from(p).ok()),
            cloud_pct: response.clouds.and_then(|c| c.all).and_then(to_percent),
            visibility_km: response.visibility.map(metres_to_km),
            source: WeatherSource::Primary,
            as_of,
            as_of_local: format_local(as_of, self.timezone),
            locality: None,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn source(&self) -> WeatherSource {
        WeatherSource::Primary
    }

    async fn current(&self, coordinate: Coordinate) -> Result<WeatherSnapshot> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            urlencoding::encode(&self.api_key)
        );
        let response: CurrentWeatherResponse =
            http::fetch_json(self.client.get(url), "openweather current", self.timeout).await?;
        Ok(self.to_snapshot(response))
    }
}
