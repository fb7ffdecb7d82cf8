//! JSON API mounted under `/api`

mod error;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

use crate::advisory::{AdvisoryService, GeminiBackend};
use crate::cache::TtlCache;
use crate::config::{FieldSenseConfig, LocationConfig};
use crate::geocode::ReverseGeocoder;
use crate::language::{Language, LanguageStore};
use crate::location::{ClientReportedPosition, CoordinateAcquirer};
use crate::location_resolver::{Conditions, ConditionsResolver};
use crate::models::{AdvisoryQuery, AdvisoryRequest, AdvisoryResponse, Coordinate};
use crate::http;
use crate::weather::WeatherResolver;

pub use error::ApiError;

const MISSING_KEY_MESSAGE: &str =
    "Gemini API key missing. Set GEMINI_API_KEY in the server environment.";

/// Header naming the client session whose coordinate cache a request uses
pub const SESSION_HEADER: &str = "x-fieldsense-session";
const DEFAULT_SESSION: &str = "default";

/// Everything the handlers share
pub struct AppState {
    /// `None` when no generative-AI key is configured
    pub advisory: Option<AdvisoryService>,
    pub resolver: ConditionsResolver,
    pub language: LanguageStore,
    pub location: LocationConfig,
    /// Live coordinates per session, shared by every request
    pub coordinates: TtlCache<Coordinate>,
    pub request_timeout: Duration,
    /// Budget for the advisory routes, long enough for every candidate to fail
    pub advisory_timeout: Duration,
}

impl AppState {
    pub fn from_config(config: &FieldSenseConfig) -> crate::Result<Self> {
        let client = http::build_client(http::USER_AGENT)?;
        let timezone = config.timezone()?;

        let advisory = config.advisory.api_key.clone().map(|key| {
            let backend = GeminiBackend::new(client.clone(), key, &config.advisory);
            AdvisoryService::from_config(Arc::new(backend), &config.advisory)
        });
        if advisory.is_none() {
            warn!("No Gemini API key configured; the advisory endpoint will answer 500");
        }

        let resolver = ConditionsResolver::new(
            Arc::new(ReverseGeocoder::new(client.clone(), config)),
            Arc::new(WeatherResolver::from_config(&client, &config.weather, timezone)),
            timezone,
        );

        Ok(Self {
            advisory,
            resolver,
            language: LanguageStore::default(),
            location: config.location.clone(),
            coordinates: TtlCache::new("coordinate", config.location.coordinate_cache_ttl()),
            request_timeout: config.server.request_timeout(),
            advisory_timeout: config.advisory_route_timeout(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let advisory_routes = Router::new()
        .route("/advisory", post(advisory))
        .route("/gemini", post(advisory))
        .layer(timeout(state.advisory_timeout));

    let other_routes = Router::new()
        .route("/reverse-geocode", get(reverse_geocode))
        .route("/conditions", get(conditions))
        .route("/language", get(get_language).put(put_language))
        .route("/health", get(health))
        .layer(timeout(state.request_timeout));

    advisory_routes.merge(other_routes).with_state(state)
}

fn timeout(after: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, after)
}

async fn advisory(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AdvisoryResponse>, ApiError> {
    // Credentials are checked before the body is even looked at
    let service = state
        .advisory
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY_MESSAGE))?;

    let query: AdvisoryQuery =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON body"))?;
    let request = AdvisoryRequest::try_from(query)?;

    Ok(Json(service.answer(request).await?))
}

async fn reverse_geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let param = |name: &str| params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
    let (Some(lat), Some(lon)) = (param("lat"), param("lon")) else {
        return ApiError::bad_request("lat/lon required").into_response();
    };

    match state.resolver.geocoder().passthrough(lat, lon).await {
        Ok((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Reverse geocode passthrough failed");
            ApiError::new(StatusCode::BAD_GATEWAY, "Upstream reverse geocode failed")
                .with("detail", e.to_string())
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConditionsParams {
    lat: Option<String>,
    lon: Option<String>,
    language: Option<String>,
}

impl ConditionsParams {
    /// Absent or unusable coordinates count as denied geolocation
    fn position(&self) -> Option<Coordinate> {
        let lat = self.lat.as_deref()?.trim().parse::<f64>().ok()?;
        let lon = self.lon.as_deref()?.trim().parse::<f64>().ok()?;
        Coordinate::new(lat, lon).ok()
    }
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn conditions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ConditionsParams>,
) -> Result<Json<Conditions>, ApiError> {
    let language = match params.language.as_deref() {
        Some(raw) => raw.parse::<Language>()?,
        None => state.language.current(),
    };

    let acquirer = CoordinateAcquirer::from_config(
        Arc::new(ClientReportedPosition(params.position())),
        &state.location,
    )
    .with_session_cache(state.coordinates.clone(), session_id(&headers));
    Ok(Json(state.resolver.resolve(&acquirer, language).await))
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguageBody {
    language: String,
}

async fn get_language(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "language": state.language.current() }))
}

async fn put_language(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LanguageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|_| ApiError::bad_request("Invalid JSON body"))?;
    let language = body.language.parse::<Language>()?;
    let changed = state.language.set(language);
    Ok(Json(json!({ "language": language, "changed": changed })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}
