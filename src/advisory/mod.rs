//! Advisory query service
//!
//! Turns a validated [`AdvisoryRequest`] into an answer. Greetings are
//! answered locally; everything else goes to a generative backend, trying
//! each configured candidate model in order until one succeeds.

pub mod gemini;
pub mod prompt;

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::config::AdvisoryConfig;
use crate::error::AdvisoryErrorCode;
use crate::models::{AdvisoryRequest, AdvisoryResponse, ImagePayload};
use crate::{FieldSenseError, Result};

pub use gemini::GeminiBackend;

static INVALID_CREDENTIAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)API key not valid|API_KEY_INVALID").ok());

const INVALID_KEY_MESSAGE: &str = "Invalid Gemini API key. Regenerate at Google AI Studio.";

/// Instruction text plus the optional inline image, sent as one user turn
#[derive(Debug, Clone)]
pub struct Prompt {
    pub instruction: String,
    pub image: Option<ImagePayload>,
}

impl Prompt {
    #[must_use]
    pub fn for_request(request: &AdvisoryRequest) -> Self {
        let image = request.image().cloned();
        Self {
            instruction: prompt::build_instruction(
                request.language(),
                request.question(),
                image.is_some(),
            ),
            image,
        }
    }
}

/// Sampling settings shared by every candidate model
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 768,
        }
    }
}

impl GenerationSettings {
    #[must_use]
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// A text-generation service addressed by model identifier
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &Prompt,
        settings: &GenerationSettings,
    ) -> Result<String>;
}

pub struct AdvisoryService {
    backend: Arc<dyn GenerativeBackend>,
    models: Vec<String>,
    settings: GenerationSettings,
}

impl AdvisoryService {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        models: Vec<String>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            backend,
            models,
            settings,
        }
    }

    pub fn from_config(backend: Arc<dyn GenerativeBackend>, config: &AdvisoryConfig) -> Self {
        Self::new(
            backend,
            config.models.clone(),
            GenerationSettings::from_config(config),
        )
    }

    /// Answer one advisory request
    ///
    /// Returns [`FieldSenseError::Generation`] only after every candidate
    /// model has failed; the code tells credential problems apart from the rest.
    #[instrument(skip_all, fields(language = %request.language(), has_image = request.image().is_some()))]
    pub async fn answer(&self, request: AdvisoryRequest) -> Result<AdvisoryResponse> {
        let greeting = request.image().is_none()
            && request.question().is_some_and(prompt::is_greeting);
        if greeting {
            info!("Answering greeting with the canned menu");
            return Ok(AdvisoryResponse::manual(
                prompt::greeting_menu(request.language()).to_string(),
            ));
        }

        let turn = Prompt::for_request(&request);
        let mut last_error: Option<FieldSenseError> = None;

        for model in &self.models {
            match self.backend.generate(model, &turn, &self.settings).await {
                Ok(text) => {
                    info!(model = %model, "Advisory answered");
                    return Ok(AdvisoryResponse {
                        text: prompt::polish_answer(text, request.is_text_only()),
                        model_used: model.clone(),
                    });
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Candidate model failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        let error = match last_error {
            Some(e) => classify_failure(&e),
            None => FieldSenseError::generation(
                "Unable to generate content",
                AdvisoryErrorCode::GenericError,
            ),
        };
        error!(error = %error, "All candidate models failed");
        Err(error)
    }
}

/// Map the last backend failure onto a remediation-specific generation error
fn classify_failure(last: &FieldSenseError) -> FieldSenseError {
    let message = match last {
        FieldSenseError::Api { message, .. }
        | FieldSenseError::Network { message }
        | FieldSenseError::Parse { message }
        | FieldSenseError::General { message } => message.clone(),
        other => other.to_string(),
    };

    let invalid_key = INVALID_CREDENTIAL
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(&message));
    if invalid_key {
        FieldSenseError::generation(INVALID_KEY_MESSAGE, AdvisoryErrorCode::ApiKeyInvalid)
    } else {
        FieldSenseError::generation(message, AdvisoryErrorCode::GenericError)
    }
}
