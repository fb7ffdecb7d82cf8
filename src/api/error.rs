use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::FieldSenseError;

/// JSON error body with the status it is sent under
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": error.into() }),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Attach an extra field to the body
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(body) = self.body.as_object_mut() {
            body.insert(key.to_string(), value.into());
        }
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FieldSenseError> for ApiError {
    fn from(err: FieldSenseError) -> Self {
        match &err {
            FieldSenseError::Validation { message } => Self::bad_request(message.clone()),
            FieldSenseError::Generation { message, code } => {
                Self::bad_request(message.clone()).with("code", code.as_str())
            }
            FieldSenseError::Config { .. }
            | FieldSenseError::Io { .. }
            | FieldSenseError::General { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.user_message())
            }
            FieldSenseError::Api { .. }
            | FieldSenseError::Network { .. }
            | FieldSenseError::Parse { .. } => {
                Self::new(StatusCode::BAD_GATEWAY, err.user_message())
            }
            FieldSenseError::Timeout { .. } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, err.user_message())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), body = %self.body, "Request failed");
        } else {
            tracing::debug!(status = self.status.as_u16(), body = %self.body, "Request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}
