//! Outbound HTTP helpers shared by every upstream client
//!
//! Each call is bounded by a hard timeout that covers both the request and
//! reading the body; a timeout surfaces as [`FieldSenseError::Timeout`] so
//! callers can treat it like any other upstream failure.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{FieldSenseError, Result};

pub const USER_AGENT: &str = concat!("FieldSense/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client
pub fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| FieldSenseError::config(format!("Failed to create HTTP client: {e}")))
}

/// Send a request and decode a JSON body, failing on non-success statuses
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    operation: &str,
    timeout: Duration,
) -> Result<T> {
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FieldSenseError::api(status.as_u16(), body));
        }
        let body = response.bytes().await?;
        serde_json::from_slice::<T>(&body).map_err(|e| {
            FieldSenseError::parse(format!("Failed to parse {operation} response: {e}"))
        })
    };
    bounded(call, operation, timeout).await
}

/// Send a request and return the upstream status with its JSON body untouched
pub async fn fetch_passthrough(
    request: RequestBuilder,
    operation: &str,
    timeout: Duration,
) -> Result<(u16, Value)> {
    let call = async {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        let value = serde_json::from_slice::<Value>(&body).map_err(|e| {
            FieldSenseError::parse(format!("Failed to parse {operation} response: {e}"))
        })?;
        Ok((status, value))
    };
    bounded(call, operation, timeout).await
}

async fn bounded<T>(
    call: impl Future<Output = Result<T>>,
    operation: &str,
    timeout: Duration,
) -> Result<T> {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(FieldSenseError::timeout(operation, timeout)),
    };

    let elapsed = started.elapsed();
    match &outcome {
        Ok(_) => debug!(operation, elapsed_ms = elapsed.as_millis() as u64, "Upstream call succeeded"),
        Err(e) => warn!(operation, elapsed_ms = elapsed.as_millis() as u64, error = %e, "Upstream call failed"),
    }
    if elapsed.as_secs() > 5 {
        warn!(operation, "Slow upstream response: {:.3}s", elapsed.as_secs_f64());
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Echo {
        ok: bool,
    }

    #[tokio::test]
    async fn test_fetch_json_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = build_client(USER_AGENT).unwrap();
        let echo: Echo = fetch_json(
            client.get(format!("{}/echo", server.uri())),
            "echo",
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert!(echo.ok);
    }

    #[tokio::test]
    async fn test_fetch_json_rejects_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = build_client(USER_AGENT).unwrap();
        let err = fetch_json::<Echo>(client.get(server.uri()), "echo", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, FieldSenseError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = build_client(USER_AGENT).unwrap();
        let err = fetch_json::<Echo>(client.get(server.uri()), "echo", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FieldSenseError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_passthrough_keeps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "Unable to geocode"})),
            )
            .mount(&server)
            .await;

        let client = build_client(USER_AGENT).unwrap();
        let (status, body) =
            fetch_passthrough(client.get(server.uri()), "geocode", Duration::from_secs(2))
                .await
                .unwrap();
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Unable to geocode");
    }
}
