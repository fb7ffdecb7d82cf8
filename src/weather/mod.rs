//! Current-weather resolution with provider fallback and a short-lived cache

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::cache::TtlCache;
use crate::config::WeatherConfig;
use crate::models::{Coordinate, WeatherSnapshot, WeatherSource};

pub mod open_meteo;
pub mod openweather;

pub use open_meteo::OpenMeteoProvider;
pub use openweather::OpenWeatherProvider;

/// A source of current conditions for a coordinate
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn source(&self) -> WeatherSource;

    async fn current(&self, coordinate: Coordinate) -> Result<WeatherSnapshot>;
}

/// Tries each provider in order; never fails
pub struct WeatherResolver {
    providers: Vec<Arc<dyn WeatherProvider>>,
    cache: TtlCache<WeatherSnapshot>,
    timezone: Tz,
}

impl WeatherResolver {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, cache_ttl: Duration, timezone: Tz) -> Self {
        Self {
            providers,
            cache: TtlCache::new("weather", cache_ttl),
            timezone,
        }
    }

    /// OpenWeather first when a key is configured, Open-Meteo always last
    pub fn from_config(client: &Client, config: &WeatherConfig, timezone: Tz) -> Self {
        let mut providers: Vec<Arc<dyn WeatherProvider>> = Vec::with_capacity(2);
        match &config.api_key {
            Some(key) => providers.push(Arc::new(OpenWeatherProvider::new(
                client.clone(),
                key.clone(),
                config,
                timezone,
            ))),
            None => info!("No weather API key configured, using Open-Meteo only"),
        }
        providers.push(Arc::new(OpenMeteoProvider::new(
            client.clone(),
            config,
            timezone,
        )));
        Self::new(providers, config.cache_ttl(), timezone)
    }

    /// Fresh cached snapshot for this locality and coordinate, if any
    pub async fn cached(&self, coordinate: Coordinate, locality: &str) -> Option<WeatherSnapshot> {
        self.cache.get(&coordinate.weather_key(locality)).await
    }

    /// Cached snapshot when fresh, otherwise the first provider that answers
    #[instrument(skip(self), fields(coordinate = %coordinate.format_coordinates()))]
    pub async fn resolve(&self, coordinate: Coordinate, locality: &str) -> WeatherSnapshot {
        let key = coordinate.weather_key(locality);
        if let Some(snapshot) = self.cached(coordinate, locality).await {
            debug!("Weather cache hit");
            return snapshot;
        }

        let locality = Some(locality.trim().to_string()).filter(|l| !l.is_empty());
        for provider in &self.providers {
            match provider.current(coordinate).await {
                Ok(mut snapshot) => {
                    snapshot.locality = locality;
                    info!(source = provider.source().as_str(), "Weather resolved");
                    if !snapshot.is_empty() {
                        self.cache.put(&key, snapshot.clone()).await;
                    }
                    return snapshot;
                }
                Err(e) => warn!(
                    source = provider.source().as_str(),
                    error = %e,
                    "Weather provider failed"
                ),
            }
        }

        warn!("Every weather provider failed, returning an empty snapshot");
        WeatherSnapshot::empty(WeatherSource::Fallback, self.timezone, locality)
    }
}

/// Round to a whole number, rejecting non-finite input
pub(crate) fn to_whole(value: f64) -> Option<i32> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX))
        .then_some(rounded as i32)
}

/// Round to a whole percentage in 0..=100
pub(crate) fn to_percent(value: f64) -> Option<u8> {
    let rounded = value.round();
    (rounded.is_finite() && (0.0..=100.0).contains(&rounded)).then_some(rounded as u8)
}
