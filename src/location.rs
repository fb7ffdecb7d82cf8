//! Coordinate acquisition for one session
//!
//! A fresh session-cached coordinate wins. The cache can be shared between
//! acquirers, keyed by session, so it outlives a single request. Otherwise the position source is
//! asked with a bounded timeout, and denial, error or timeout all land on the
//! configured fallback coordinate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::cache::TtlCache;
use crate::config::LocationConfig;
use crate::models::{Coordinate, CoordinateOrigin};

const DEFAULT_SESSION: &str = "session";

/// Device geolocation or anything standing in for it
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// `Ok(None)` means the user denied access
    async fn current_position(&self) -> Result<Option<Coordinate>>;
}

/// Position already reported by the client alongside its request
#[derive(Debug, Clone, Copy)]
pub struct ClientReportedPosition(pub Option<Coordinate>);

#[async_trait]
impl PositionSource for ClientReportedPosition {
    async fn current_position(&self) -> Result<Option<Coordinate>> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquiredCoordinate {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub origin: CoordinateOrigin,
    /// Place name of the fallback coordinate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub struct CoordinateAcquirer {
    source: Arc<dyn PositionSource>,
    cache: TtlCache<Coordinate>,
    session: String,
    timeout: Duration,
    fallback: Coordinate,
    fallback_name: Option<String>,
}

impl CoordinateAcquirer {
    pub fn new(
        source: Arc<dyn PositionSource>,
        timeout: Duration,
        cache_ttl: Duration,
        fallback: Coordinate,
    ) -> Self {
        Self {
            source,
            cache: TtlCache::new("coordinate", cache_ttl),
            session: DEFAULT_SESSION.to_string(),
            timeout,
            fallback,
            fallback_name: None,
        }
    }

    pub fn from_config(source: Arc<dyn PositionSource>, config: &LocationConfig) -> Self {
        let mut acquirer = Self::new(
            source,
            config.geolocation_timeout(),
            config.coordinate_cache_ttl(),
            config.fallback_coordinate(),
        );
        acquirer.fallback_name = Some(config.fallback_name.clone());
        acquirer
    }

    /// Keep live coordinates in `cache` under `session` instead of a private cache
    #[must_use]
    pub fn with_session_cache(
        mut self,
        cache: TtlCache<Coordinate>,
        session: impl Into<String>,
    ) -> Self {
        self.cache = cache;
        self.session = session.into();
        self
    }

    /// The session coordinate, if one was acquired live within the TTL
    pub async fn cached(&self) -> Option<Coordinate> {
        self.cache.get(&self.session).await
    }

    #[must_use]
    pub fn fallback(&self) -> AcquiredCoordinate {
        AcquiredCoordinate {
            coordinate: self.fallback,
            origin: CoordinateOrigin::Fallback,
            label: self.fallback_name.clone(),
        }
    }

    pub async fn acquire(&self) -> AcquiredCoordinate {
        if let Some(coordinate) = self.cached().await {
            debug!("Using session-cached coordinate");
            return AcquiredCoordinate {
                coordinate,
                origin: CoordinateOrigin::Cached,
                label: None,
            };
        }

        match tokio::time::timeout(self.timeout, self.source.current_position()).await {
            Ok(Ok(Some(coordinate))) => {
                info!(coordinate = %coordinate.format_coordinates(), "Acquired live position");
                self.cache.put(&self.session, coordinate).await;
                return AcquiredCoordinate {
                    coordinate,
                    origin: CoordinateOrigin::Live,
                    label: None,
                };
            }
            Ok(Ok(None)) => info!("Position access denied, using fallback coordinate"),
            Ok(Err(e)) => warn!(error = %e, "Position source failed, using fallback coordinate"),
            Err(_) => warn!(
                timeout_s = self.timeout.as_secs_f64(),
                "Position source timed out, using fallback coordinate"
            ),
        }

        self.fallback()
    }
}
