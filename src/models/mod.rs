//! Data models for the `FieldSense` service
//!
//! - Advisory: farmer questions, crop photos and generated answers
//! - Location: coordinates and their cache-key rounding
//! - Address: reverse-geocoded place names
//! - Weather: provider-tagged current-weather snapshots

pub mod address;
pub mod advisory;
pub mod location;
pub mod weather;

pub use address::AddressInfo;
pub use advisory::{
    AdvisoryQuery, AdvisoryRequest, AdvisoryResponse, ImagePayload, MANUAL_RESPONSE_MODEL,
};
pub use location::{Coordinate, CoordinateOrigin};
pub use weather::{WeatherSnapshot, WeatherSource};
