//! `FieldSense` - farm advisory assistant and local conditions service
//!
//! This library answers farmers' crop questions through a generative-AI
//! backend and resolves a best-effort address and current weather for
//! wherever the user is, tolerating outages of every upstream provider.

pub mod advisory;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod http;
pub mod language;
pub mod location;
pub mod location_resolver;
pub mod models;
pub mod telemetry;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use advisory::{AdvisoryService, GenerativeBackend};
pub use cache::TtlCache;
pub use config::FieldSenseConfig;
pub use error::{AdvisoryErrorCode, FieldSenseError};
pub use language::{Language, LanguageStore};
pub use location_resolver::{Conditions, ConditionsResolver};
pub use models::{AddressInfo, AdvisoryRequest, AdvisoryResponse, Coordinate, WeatherSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, FieldSenseError>;
