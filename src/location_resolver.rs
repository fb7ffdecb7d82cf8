//! Location/weather resolution cycle
//!
//! One cycle walks `AcquireCoordinate -> ResolveAddress -> ResolveWeather -> Done`.
//! Every stage degrades instead of failing, so a cycle always produces
//! [`Conditions`] unless it is cancelled.

use std::sync::Arc;

use chrono::{Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::geocode::ReverseGeocoder;
use crate::language::Language;
use crate::location::{AcquiredCoordinate, CoordinateAcquirer};
use crate::models::{AddressInfo, WeatherSnapshot};
use crate::weather::WeatherResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    AcquireCoordinate,
    ResolveAddress,
    ResolveWeather,
    Done,
}

/// Best-effort address and weather for wherever the user is
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    pub coordinate: AcquiredCoordinate,
    pub address: AddressInfo,
    pub weather: WeatherSnapshot,
    pub language: Language,
    /// Time-of-day greeting in `language`
    pub salutation: &'static str,
}

fn enter(stage: ResolutionStage) {
    debug!(?stage, "Entering resolution stage");
}

pub struct ConditionsResolver {
    geocoder: Arc<ReverseGeocoder>,
    weather: Arc<WeatherResolver>,
    timezone: Tz,
}

impl ConditionsResolver {
    pub fn new(geocoder: Arc<ReverseGeocoder>, weather: Arc<WeatherResolver>, timezone: Tz) -> Self {
        Self {
            geocoder,
            weather,
            timezone,
        }
    }

    #[must_use]
    pub fn geocoder(&self) -> &ReverseGeocoder {
        &self.geocoder
    }

    /// Run one full cycle. Dropping the future abandons it at the next await.
    #[instrument(skip(self, acquirer))]
    pub async fn resolve(&self, acquirer: &CoordinateAcquirer, language: Language) -> Conditions {
        enter(ResolutionStage::AcquireCoordinate);
        let coordinate = acquirer.acquire().await;

        enter(ResolutionStage::ResolveAddress);
        let address = self.geocoder.lookup(coordinate.coordinate, language).await;

        enter(ResolutionStage::ResolveWeather);
        // The fallback place name stands in when geocoding found nothing
        let locality = address
            .locality()
            .or(coordinate.label.as_deref())
            .unwrap_or_default();
        let weather = self.weather.resolve(coordinate.coordinate, locality).await;

        enter(ResolutionStage::Done);
        let conditions = Conditions {
            coordinate,
            address,
            weather,
            language,
            salutation: language.salutation(Utc::now().with_timezone(&self.timezone).hour()),
        };
        info!(
            origin = ?conditions.coordinate.origin,
            source = conditions.weather.source.as_str(),
            "Resolution cycle complete"
        );
        conditions
    }

    /// Like [`resolve`](Self::resolve), but stops as soon as `token` is cancelled.
    ///
    /// Returns `None` when cancelled; the abandoned cycle writes nothing to
    /// any cache afterwards.
    pub async fn resolve_until_cancelled(
        &self,
        acquirer: &CoordinateAcquirer,
        language: Language,
        token: &CancellationToken,
    ) -> Option<Conditions> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                info!("Resolution cycle cancelled");
                None
            }
            conditions = self.resolve(acquirer, language) => Some(conditions),
        }
    }
}
