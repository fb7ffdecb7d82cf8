//! End-to-end tests for the FieldSense HTTP API
//!
//! The router runs in-process; every upstream is a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fieldsense::api::{AppState, SESSION_HEADER};
use fieldsense::config::FieldSenseConfig;
use fieldsense::web;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLASH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";
const FLASH_LATEST: &str = "/v1beta/models/gemini-1.5-flash-latest:generateContent";
const PRO: &str = "/v1beta/models/gemini-1.5-pro:generateContent";

struct Harness {
    gemini: MockServer,
    proxy: MockServer,
    nominatim: MockServer,
    open_meteo: MockServer,
    app: Router,
}

impl Harness {
    async fn start(with_key: bool) -> Self {
        Self::start_with(with_key, |_| {}).await
    }

    async fn start_with(with_key: bool, tune: impl FnOnce(&mut FieldSenseConfig)) -> Self {
        let gemini = MockServer::start().await;
        let proxy = MockServer::start().await;
        let nominatim = MockServer::start().await;
        let open_meteo = MockServer::start().await;

        let mut config = FieldSenseConfig::default();
        config.advisory.api_key = with_key.then(|| "test-key".to_string());
        config.advisory.base_url = gemini.uri();
        config.geocoding.proxy_url = Some(format!("{}/api/reverse-geocode", proxy.uri()));
        config.geocoding.provider_url = format!("{}/reverse", nominatim.uri());
        config.geocoding.timeout_seconds = 2;
        config.weather.fallback_base_url = open_meteo.uri();
        config.weather.timeout_seconds = 2;
        tune(&mut config);

        let state = AppState::from_config(&config).unwrap();
        let app = web::app(Arc::new(state), &config.server);
        Self {
            gemini,
            proxy,
            nominatim,
            open_meteo,
            app,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn get_in_session(&self, uri: &str, session: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(SESSION_HEADER, session)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Every geocoding and weather upstream answers 503
    async fn fail_lookups(&self) {
        for server in [&self.proxy, &self.nominatim, &self.open_meteo] {
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(server)
                .await;
        }
    }

    /// Gemini must never be called in this test
    async fn forbid_gemini(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.gemini)
            .await;
    }
}

fn gemini_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

fn gemini_invalid_key() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT",
            "details": [{ "reason": "API_KEY_INVALID" }]
        }
    }))
}

const LONG_ANSWER: &str = "Summary: nitrogen deficiency. Apply 20 kg urea per acre after irrigation.";

#[tokio::test]
async fn test_health() {
    let harness = Harness::start(true).await;
    let (status, body) = harness.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], fieldsense::VERSION);
}

#[tokio::test]
async fn test_missing_credential_is_checked_before_the_body() {
    let harness = Harness::start(false).await;
    let (status, body) = harness.post_json("/api/advisory", "{not json").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let harness = Harness::start(true).await;
    harness.forbid_gemini().await;

    let (status, body) = harness.post_json("/api/advisory", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));
}

#[tokio::test]
async fn test_missing_language_makes_no_outbound_call() {
    let harness = Harness::start(true).await;
    harness.forbid_gemini().await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"question":"Leaves turning yellow in wheat"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "language is required");
}

#[tokio::test]
async fn test_missing_question_and_image() {
    let harness = Harness::start(true).await;
    harness.forbid_gemini().await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"   "}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "question is required when image is not provided");
}

#[tokio::test]
async fn test_greeting_is_answered_locally() {
    let harness = Harness::start(true).await;
    harness.forbid_gemini().await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"Hello"}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "manual-response");
    assert!(body["text"].as_str().unwrap().contains("farm advisor"));
}

#[tokio::test]
async fn test_invalid_key_on_first_candidate_uses_second() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .and(path(FLASH))
        .respond_with(gemini_invalid_key())
        .expect(1)
        .mount(&harness.gemini)
        .await;
    Mock::given(method("POST"))
        .and(path(FLASH_LATEST))
        .respond_with(gemini_answer(LONG_ANSWER))
        .expect(1)
        .mount(&harness.gemini)
        .await;
    Mock::given(method("POST"))
        .and(path(PRO))
        .respond_with(gemini_answer("unused"))
        .expect(0)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json(
            "/api/advisory",
            r#"{"language":"english","question":"Leaves turning yellow in wheat"}"#,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "gemini-1.5-flash-latest");
    assert_eq!(body["text"], LONG_ANSWER);
    assert!(body.get("code").is_none());
}

#[tokio::test]
async fn test_exhausted_candidates_report_invalid_key() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .respond_with(gemini_invalid_key())
        .expect(3)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json("/api/gemini", r#"{"language":"hindi","question":"धान में पानी कब बदलें"}"#)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "API_KEY_INVALID");
    assert_eq!(
        body["error"],
        "Invalid Gemini API key. Regenerate at Google AI Studio."
    );
}

#[tokio::test]
async fn test_exhausted_candidates_report_generic_error() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("The model is overloaded."))
        .expect(3)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"Aphids on mustard"}"#)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "GENERIC_ERROR");
    assert!(body["error"].as_str().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn test_generic_error_carries_the_upstream_message_only() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED"
            }
        })))
        .expect(3)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"Aphids on mustard"}"#)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "error": "Resource has been exhausted (e.g. check quota).",
            "code": "GENERIC_ERROR"
        })
    );
}

#[tokio::test]
async fn test_slow_candidates_all_get_their_turn() {
    let harness = Harness::start_with(true, |config| {
        config.advisory.timeout_seconds = 1;
        config.server.request_timeout_seconds = 2;
    })
    .await;
    Mock::given(method("POST"))
        .respond_with(gemini_answer(LONG_ANSWER).set_delay(Duration::from_millis(1500)))
        .expect(3)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"Aphids on mustard"}"#)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "GENERIC_ERROR");
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_short_answer_is_elaborated() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .and(path(FLASH))
        .respond_with(gemini_answer("Use neem oil."))
        .mount(&harness.gemini)
        .await;

    let (_, body) = harness
        .post_json("/api/advisory", r#"{"language":"english","question":"Aphids on mustard"}"#)
        .await;

    assert_eq!(
        body["text"],
        "Use neem oil.\n\n(Add specifics on: nutrient needs, irrigation, and monitoring signs.)"
    );
}

#[tokio::test]
async fn test_image_request_is_forwarded_inline() {
    let harness = Harness::start(true).await;
    Mock::given(method("POST"))
        .and(path(FLASH))
        .and(wiremock::matchers::body_string_contains("\"inlineData\""))
        .respond_with(gemini_answer("Rust."))
        .expect(1)
        .mount(&harness.gemini)
        .await;

    let (status, body) = harness
        .post_json(
            "/api/advisory",
            r#"{"language":"english","image":{"data":"iVBORw0KGgo=","mimeType":"image/png"}}"#,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    // Image answers are never padded
    assert_eq!(body["text"], "Rust.");
}

#[tokio::test]
async fn test_reverse_geocode_requires_coordinates() {
    let harness = Harness::start(true).await;
    let (status, body) = harness.get("/api/reverse-geocode?lat=18.52").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "lat/lon required" }));
}

#[tokio::test]
async fn test_reverse_geocode_passes_upstream_through() {
    let harness = Harness::start(true).await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "18.5204"))
        .and(query_param("lon", "73.8567"))
        .and(query_param("addressdetails", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "Shivajinagar, Pune",
            "address": { "suburb": "Shivajinagar", "city": "Pune" }
        })))
        .expect(1)
        .mount(&harness.nominatim)
        .await;

    let (status, body) = harness
        .get("/api/reverse-geocode?lat=18.5204&lon=73.8567")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"]["city"], "Pune");
}

#[tokio::test]
async fn test_reverse_geocode_upstream_failure_is_bad_gateway() {
    let harness = Harness::start(true).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&harness.nominatim)
        .await;

    let (status, body) = harness
        .get("/api/reverse-geocode?lat=18.5204&lon=73.8567")
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Upstream reverse geocode failed");
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_conditions_without_position_use_fallback() {
    let harness = Harness::start(true).await;
    Mock::given(method("GET"))
        .and(path("/api/reverse-geocode"))
        .and(query_param("lat", "18.5204"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "address": { "suburb": "Shivajinagar", "city": "Pune", "state": "Maharashtra", "postcode": "411005" }
        })))
        .expect(1)
        .mount(&harness.proxy)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current": { "temperature_2m": 29.4, "relative_humidity_2m": 48 }
        })))
        .expect(1)
        .mount(&harness.open_meteo)
        .await;

    let (status, body) = harness.get("/api/conditions?language=english").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coordinate"]["origin"], "fallback");
    assert_eq!(
        body["address"]["fullText"],
        "Shivajinagar, Pune, Maharashtra, 411005"
    );
    assert_eq!(body["weather"]["temperatureC"], 29);
    assert_eq!(body["weather"]["source"], "open-meteo");
    assert_eq!(body["language"], "english");
}

#[tokio::test]
async fn test_conditions_survive_total_outage() {
    let harness = Harness::start(true).await;
    harness.fail_lookups().await;

    let (status, body) = harness
        .get("/api/conditions?lat=20.0110&lon=73.7903&language=hindi")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coordinate"]["origin"], "live");
    assert_eq!(body["address"]["fullText"], "स्थान उपलब्ध नहीं");
    assert_eq!(body["weather"]["source"], "open-meteo");
    assert!(body["weather"]["temperatureC"].is_null());
    assert!(body["weather"]["asOf"].is_string());
}

#[tokio::test]
async fn test_session_reuses_its_live_coordinate() {
    let harness = Harness::start(true).await;
    harness.fail_lookups().await;

    let (_, body) = harness
        .get_in_session("/api/conditions?lat=20.0110&lon=73.7903", "farm-42")
        .await;
    assert_eq!(body["coordinate"]["origin"], "live");

    let (status, body) = harness.get_in_session("/api/conditions", "farm-42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coordinate"]["origin"], "cached");
    assert_eq!(body["coordinate"]["latitude"], 20.011);
    assert_eq!(body["coordinate"]["longitude"], 73.7903);

    let (_, body) = harness.get_in_session("/api/conditions", "farm-7").await;
    assert_eq!(body["coordinate"]["origin"], "fallback");
    assert_eq!(body["coordinate"]["label"], "Pune");
}

#[tokio::test]
async fn test_conditions_reject_unknown_language() {
    let harness = Harness::start(true).await;
    let (status, body) = harness.get("/api/conditions?language=french").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("french"));
}

#[tokio::test]
async fn test_language_store_drives_conditions_default() {
    let harness = Harness::start(true).await;
    harness.fail_lookups().await;

    let (_, body) = harness.get("/api/language").await;
    assert_eq!(body["language"], "hindi");

    let request = Request::builder()
        .method("PUT")
        .uri("/api/language")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"language":"english"}"#))
        .unwrap();
    let (status, body) = harness.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);

    let (_, body) = harness.get("/api/conditions").await;
    assert_eq!(body["language"], "english");
    assert_eq!(body["address"]["fullText"], "Location unavailable");
}

#[tokio::test]
async fn test_unknown_language_is_rejected() {
    let harness = Harness::start(true).await;
    let request = Request::builder()
        .method("PUT")
        .uri("/api/language")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"language":"klingon"}"#))
        .unwrap();
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
