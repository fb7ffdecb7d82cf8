//! Gemini `generateContent` REST backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationSettings, GenerativeBackend, Prompt};
use crate::config::AdvisoryConfig;
use crate::{FieldSenseError, Result, http};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

/// Untagged union of text and inline media content parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Swap a raw `{"error": {...}}` body for the message Gemini put inside it
fn upstream_message(err: FieldSenseError) -> FieldSenseError {
    match err {
        FieldSenseError::Api { status, message } => {
            let message = serde_json::from_str::<ErrorEnvelope>(&message)
                .map(|envelope| envelope.error.message)
                .unwrap_or(message);
            FieldSenseError::Api { status, message }
        }
        other => other,
    }
}

/// Lightweight Gemini REST client
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: String, config: &AdvisoryConfig) -> Self {
        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &Prompt,
        settings: &GenerationSettings,
    ) -> Result<String> {
        let mut parts = vec![Part::Text {
            text: &prompt.instruction,
        }];
        if let Some(image) = &prompt.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: &image.mime_type,
                    data: &image.data,
                },
            });
        }
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config: settings,
        };

        let request = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response: GenerateContentResponse =
            http::fetch_json(request, "gemini generateContent", self.timeout)
                .await
                .map_err(upstream_message)?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| FieldSenseError::parse(format!("No candidates returned by {model}")))?;

        Ok(text)
    }
}
