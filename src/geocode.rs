//! Reverse geocoding: coordinate to a human-readable address.
//! Goes through the same-origin proxy first and Nominatim directly second.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::cache::TtlCache;
use crate::config::FieldSenseConfig;
use crate::language::Language;
use crate::models::{AddressInfo, Coordinate};
use crate::{FieldSenseError, Result, http};

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    suburb: Option<String>,
    neighbourhood: Option<String>,
    village: Option<String>,
    town: Option<String>,
    hamlet: Option<String>,
    locality: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

impl From<NominatimAddress> for AddressInfo {
    fn from(a: NominatimAddress) -> Self {
        let area = first_present([
            &a.suburb,
            &a.neighbourhood,
            &a.village,
            &a.town,
            &a.hamlet,
            &a.locality,
        ]);
        let city = first_present([&a.city, &a.town, &a.village, &a.county]);
        AddressInfo::from_parts(area, city, a.state, a.postcode)
    }
}

fn first_present<const N: usize>(candidates: [&Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .cloned()
}

/// Pick address fields out of a raw Nominatim `reverse` body
pub fn parse_address(body: Value) -> Result<AddressInfo> {
    let response: NominatimResponse = serde_json::from_value(body)?;
    let address = response
        .address
        .ok_or_else(|| FieldSenseError::parse("Reverse geocode response has no address"))?;
    Ok(address.into())
}

pub struct ReverseGeocoder {
    client: Client,
    proxy_url: String,
    provider_url: String,
    user_agent: String,
    timeout: Duration,
    cache: TtlCache<AddressInfo>,
}

impl ReverseGeocoder {
    pub fn new(client: Client, config: &FieldSenseConfig) -> Self {
        Self {
            client,
            proxy_url: config.proxy_url(),
            provider_url: config.geocoding.provider_url.clone(),
            user_agent: config.geocoding.user_agent.clone(),
            timeout: config.geocoding.timeout(),
            cache: TtlCache::new("address", config.geocoding.cache_ttl()),
        }
    }

    pub async fn cached(&self, coordinate: Coordinate) -> Option<AddressInfo> {
        self.cache.get(&coordinate.address_key()).await
    }

    /// Address for a coordinate; never fails
    ///
    /// When both the proxy and the direct call fail the result only carries
    /// the localized "location unavailable" text, and nothing is cached.
    #[instrument(skip(self), fields(coordinate = %coordinate.format_coordinates()))]
    pub async fn lookup(&self, coordinate: Coordinate, language: Language) -> AddressInfo {
        let key = coordinate.address_key();
        if let Some(address) = self.cached(coordinate).await {
            debug!("Address cache hit");
            return address;
        }

        let proxied = self
            .fetch(self.proxy_request(coordinate), "reverse geocode proxy")
            .await;
        let resolved = match proxied {
            Ok(address) => Ok(address),
            Err(e) => {
                warn!(error = %e, "Reverse geocode proxy failed, calling provider directly");
                self.fetch(self.provider_request(coordinate), "reverse geocode direct")
                    .await
            }
        };

        match resolved {
            Ok(address) => {
                info!(full_text = address.full_text.as_deref().unwrap_or(""), "Address resolved");
                self.cache.put(&key, address.clone()).await;
                address
            }
            Err(e) => {
                warn!(error = %e, "Reverse geocoding unavailable");
                AddressInfo::unavailable(language.location_unavailable())
            }
        }
    }

    /// Raw provider answer for the proxy endpoint, upstream status included
    pub async fn passthrough(&self, lat: &str, lon: &str) -> Result<(u16, Value)> {
        let request = self
            .client
            .get(&self.provider_url)
            .query(&[
                ("format", "json"),
                ("addressdetails", "1"),
                ("zoom", "18"),
                ("lat", lat),
                ("lon", lon),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        http::fetch_passthrough(request, "reverse geocode passthrough", self.timeout).await
    }

    async fn fetch(&self, request: RequestBuilder, operation: &str) -> Result<AddressInfo> {
        let body: Value = http::fetch_json(request, operation, self.timeout).await?;
        parse_address(body)
    }

    fn proxy_request(&self, coordinate: Coordinate) -> RequestBuilder {
        self.client.get(&self.proxy_url).query(&[
            ("lat", coordinate.latitude),
            ("lon", coordinate.longitude),
        ])
    }

    fn provider_request(&self, coordinate: Coordinate) -> RequestBuilder {
        let url = format!(
            "{}?format=json&addressdetails=1&zoom=18&lat={}&lon={}",
            self.provider_url, coordinate.latitude, coordinate.longitude
        );
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
    }
}
