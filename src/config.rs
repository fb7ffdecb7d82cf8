//! Configuration management for the `FieldSense` service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::FieldSenseError;
use crate::models::Coordinate;

/// Root configuration structure for the `FieldSense` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSenseConfig {
    pub server: ServerConfig,
    pub advisory: AdvisoryConfig,
    pub weather: WeatherConfig,
    pub geocoding: GeocodingConfig,
    pub location: LocationConfig,
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL of this service; the geocoding proxy lives under it.
    /// Derived from the listen address when unset.
    pub base_url: Option<String>,
    /// Prebuilt frontend served for non-API paths
    pub static_dir: Option<String>,
    pub body_limit_bytes: usize,
    pub request_timeout_seconds: u32,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

/// Generative backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Generative-AI credential; the advisory endpoint is disabled without it
    pub api_key: Option<String>,
    pub base_url: String,
    /// Candidate models, preferred first
    pub models: Vec<String>,
    pub timeout_seconds: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Primary provider credential; absent means fallback provider only
    pub api_key: Option<String>,
    pub primary_base_url: String,
    pub fallback_base_url: String,
    /// IANA time zone used for local timestamps and the fallback provider
    pub timezone: String,
    pub timeout_seconds: u32,
    pub cache_ttl_seconds: u64,
}

/// Reverse geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Overrides the proxy URL derived from `server.base_url`
    pub proxy_url: Option<String>,
    pub provider_url: String,
    pub user_agent: String,
    pub timeout_seconds: u32,
    pub cache_ttl_seconds: u64,
}

/// Coordinate acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
    pub fallback_name: String,
    pub geolocation_timeout_seconds: u32,
    pub coordinate_cache_ttl_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
    /// OTLP/HTTP collector endpoint; export is off when unset
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_advisory_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_models() -> Vec<String> {
    vec![
        "gemini-1.5-flash".to_string(),
        "gemini-1.5-flash-latest".to_string(),
        "gemini-1.5-pro".to_string(),
    ]
}

fn default_primary_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_fallback_weather_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_upstream_timeout() -> u32 {
    7
}

fn default_request_timeout() -> u32 {
    60
}

fn default_advisory_timeout() -> u32 {
    30
}

fn default_geolocation_timeout() -> u32 {
    8
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

const WEATHER_CACHE_TTL_SECONDS: u64 = 10 * 60;
const ADDRESS_CACHE_TTL_SECONDS: u64 = 60 * 60;
const COORDINATE_CACHE_TTL_SECONDS: u64 = 60 * 60;

/// Slack on top of the candidate chain before the advisory route gives up
const ADVISORY_ROUTE_SLACK: Duration = Duration::from_secs(5);

fn default_provider_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_user_agent() -> String {
    "FieldSense-Dashboard/1.0 (support@fieldsense.local)".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: default_port(),
            base_url: None,
            static_dir: None,
            body_limit_bytes: default_body_limit(),
            request_timeout_seconds: default_request_timeout(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_advisory_base_url(),
            models: default_models(),
            timeout_seconds: default_advisory_timeout(),
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 768,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            primary_base_url: default_primary_weather_url(),
            fallback_base_url: default_fallback_weather_url(),
            timezone: default_timezone(),
            timeout_seconds: default_upstream_timeout(),
            cache_ttl_seconds: WEATHER_CACHE_TTL_SECONDS,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            provider_url: default_provider_url(),
            user_agent: default_user_agent(),
            timeout_seconds: default_upstream_timeout(),
            cache_ttl_seconds: ADDRESS_CACHE_TTL_SECONDS,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fallback_latitude: 18.5204,
            fallback_longitude: 73.8567,
            fallback_name: "Pune".to_string(),
            geolocation_timeout_seconds: default_geolocation_timeout(),
            coordinate_cache_ttl_seconds: COORDINATE_CACHE_TTL_SECONDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl FieldSenseConfig {
    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("fieldsense.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides: FIELDSENSE_WEATHER__API_KEY, ...
        builder = builder.add_source(
            Environment::with_prefix("FIELDSENSE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("advisory.models")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: FieldSenseConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_env_credentials();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fieldsense").join("fieldsense.toml"))
    }

    /// Pick up the well-known credential variables when the prefixed ones are absent
    pub fn apply_env_credentials(&mut self) {
        let lookup = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if self.advisory.api_key.is_none() {
            self.advisory.api_key = lookup("GEMINI_API_KEY");
        }
        if self.weather.api_key.is_none() {
            self.weather.api_key = lookup("OPENWEATHER_API_KEY");
        }
        if let Some(base_url) = lookup("FIELDSENSE_BASE_URL") {
            self.server.base_url = Some(base_url);
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        if self.server.base_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.server.base_url = None;
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.server.body_limit_bytes == 0 {
            self.server.body_limit_bytes = default_body_limit();
        }
        if self.advisory.timeout_seconds == 0 {
            self.advisory.timeout_seconds = default_advisory_timeout();
        }
        if self.advisory.base_url.is_empty() {
            self.advisory.base_url = default_advisory_base_url();
        }
        self.advisory.models.retain(|model| !model.trim().is_empty());
        if self.advisory.models.is_empty() {
            self.advisory.models = default_models();
        }
        if self.weather.timezone.is_empty() {
            self.weather.timezone = default_timezone();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_upstream_timeout();
        }
        if self.weather.cache_ttl_seconds == 0 {
            self.weather.cache_ttl_seconds = WEATHER_CACHE_TTL_SECONDS;
        }
        if self.geocoding.timeout_seconds == 0 {
            self.geocoding.timeout_seconds = default_upstream_timeout();
        }
        if self.geocoding.cache_ttl_seconds == 0 {
            self.geocoding.cache_ttl_seconds = ADDRESS_CACHE_TTL_SECONDS;
        }
        if self.location.geolocation_timeout_seconds == 0 {
            self.location.geolocation_timeout_seconds = default_geolocation_timeout();
        }
        if self.location.coordinate_cache_ttl_seconds == 0 {
            self.location.coordinate_cache_ttl_seconds = COORDINATE_CACHE_TTL_SECONDS;
        }
        if self.location.fallback_name.trim().is_empty() {
            self.location.fallback_name = LocationConfig::default().fallback_name;
        }
        if self.geocoding.user_agent.is_empty() {
            self.geocoding.user_agent = default_user_agent();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        for (name, key) in [
            ("Generative AI", &self.advisory.api_key),
            ("Weather", &self.weather.api_key),
        ] {
            if let Some(key) = key {
                if key.trim().is_empty() {
                    return Err(FieldSenseError::config(format!(
                        "{name} API key cannot be empty if provided. Either remove it or provide a valid key."
                    ))
                    .into());
                }
                if key.len() > 200 {
                    return Err(FieldSenseError::config(format!(
                        "{name} API key appears to be invalid (too long). Please check your API key."
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        for (name, seconds) in [
            ("Advisory", self.advisory.timeout_seconds),
            ("Weather", self.weather.timeout_seconds),
            ("Geocoding", self.geocoding.timeout_seconds),
            ("Geolocation", self.location.geolocation_timeout_seconds),
            ("Server request", self.server.request_timeout_seconds),
        ] {
            if seconds > 300 {
                return Err(FieldSenseError::config(format!(
                    "{name} timeout cannot exceed 300 seconds"
                ))
                .into());
            }
        }

        if self.weather.cache_ttl_seconds > 24 * 60 * 60
            || self.geocoding.cache_ttl_seconds > 24 * 60 * 60
            || self.location.coordinate_cache_ttl_seconds > 24 * 60 * 60
        {
            return Err(FieldSenseError::config("Cache TTL cannot exceed 24 hours").into());
        }

        if !(0.0..=2.0).contains(&self.advisory.temperature) {
            return Err(
                FieldSenseError::config("Advisory temperature must be between 0 and 2").into(),
            );
        }

        if !(0.0..=1.0).contains(&self.advisory.top_p) {
            return Err(FieldSenseError::config("Advisory top_p must be between 0 and 1").into());
        }

        Coordinate::new(
            self.location.fallback_latitude,
            self.location.fallback_longitude,
        )
        .map_err(|e| FieldSenseError::config(format!("Invalid fallback coordinate: {e}")))?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(FieldSenseError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(FieldSenseError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Server base URL", self.server.base_url.as_ref()),
            ("Advisory base URL", Some(&self.advisory.base_url)),
            ("Primary weather URL", Some(&self.weather.primary_base_url)),
            ("Fallback weather URL", Some(&self.weather.fallback_base_url)),
            ("Geocoding provider URL", Some(&self.geocoding.provider_url)),
            ("Geocoding proxy URL", self.geocoding.proxy_url.as_ref()),
            ("OTLP endpoint", self.logging.otlp_endpoint.as_ref()),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(FieldSenseError::config(format!(
                        "{name} must be a valid HTTP or HTTPS URL"
                    ))
                    .into());
                }
            }
        }

        self.timezone()?;

        if self.server.tls_cert_path.is_some() != self.server.tls_key_path.is_some() {
            return Err(FieldSenseError::config(
                "TLS needs both tls_cert_path and tls_key_path",
            )
            .into());
        }

        Ok(())
    }

    /// Parsed IANA time zone for local timestamps
    pub fn timezone(&self) -> crate::Result<Tz> {
        self.weather.timezone.parse::<Tz>().map_err(|_| {
            FieldSenseError::config(format!(
                "Unknown time zone '{}'",
                self.weather.timezone
            ))
        })
    }

    /// URL of the same-origin reverse-geocode proxy
    #[must_use]
    pub fn proxy_url(&self) -> String {
        self.geocoding.proxy_url.clone().unwrap_or_else(|| {
            format!(
                "{}/api/reverse-geocode",
                self.server.public_base_url().trim_end_matches('/')
            )
        })
    }

    /// Time the advisory route may take: every candidate timing out in turn, plus slack
    #[must_use]
    pub fn advisory_route_timeout(&self) -> Duration {
        let candidates = u32::try_from(self.advisory.models.len()).unwrap_or(u32::MAX);
        let chain = self.advisory.timeout().saturating_mul(candidates.max(1));
        chain
            .saturating_add(ADVISORY_ROUTE_SLACK)
            .max(self.server.request_timeout())
    }
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.into())
    }

    /// `base_url` if configured, otherwise this server's own listen address
    #[must_use]
    pub fn public_base_url(&self) -> String {
        if let Some(base_url) = &self.base_url {
            return base_url.clone();
        }
        let scheme = if self.tls_cert_path.is_some() { "https" } else { "http" };
        let host = match self.host.as_str() {
            "" | "0.0.0.0" | "::" | "[::]" => "localhost",
            host => host,
        };
        format!("{scheme}://{host}:{}", self.port)
    }
}

impl AdvisoryConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl WeatherConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl GeocodingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl LocationConfig {
    #[must_use]
    pub fn fallback_coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.fallback_latitude,
            longitude: self.fallback_longitude,
        }
    }

    #[must_use]
    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation_timeout_seconds.into())
    }

    #[must_use]
    pub fn coordinate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.coordinate_cache_ttl_seconds)
    }
}
