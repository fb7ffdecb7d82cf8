//! Advisory request/response models and input validation

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::FieldSenseError;
use crate::language::Language;

/// Model marker for answers produced without a backend call
pub const MANUAL_RESPONSE_MODEL: &str = "manual-response";

/// Inline crop photo sent alongside (or instead of) a question
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Base64-encoded image bytes
    pub data: String,
    pub mime_type: String,
}

/// Advisory request body as it arrives over the wire, before validation
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AdvisoryQuery {
    pub question: Option<String>,
    pub language: Option<String>,
    pub image: Option<ImagePayload>,
}

/// A validated advisory request: at least one of `question` or `image` is present
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryRequest {
    question: Option<String>,
    language: Language,
    image: Option<ImagePayload>,
}

impl AdvisoryRequest {
    pub fn new(
        question: Option<String>,
        language: Language,
        image: Option<ImagePayload>,
    ) -> crate::Result<Self> {
        let question = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        if question.is_none() && image.is_none() {
            return Err(FieldSenseError::validation(
                "question is required when image is not provided",
            ));
        }
        let image = image.map(normalize_image).transpose()?;

        Ok(Self {
            question,
            language,
            image,
        })
    }

    pub fn text(question: &str, language: Language) -> crate::Result<Self> {
        Self::new(Some(question.to_string()), language, None)
    }

    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImagePayload> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn is_text_only(&self) -> bool {
        self.image.is_none() && self.question.is_some()
    }
}

impl TryFrom<AdvisoryQuery> for AdvisoryRequest {
    type Error = FieldSenseError;

    fn try_from(query: AdvisoryQuery) -> Result<Self, Self::Error> {
        let language = match query.language.as_deref().map(str::trim) {
            None | Some("") => return Err(FieldSenseError::validation("language is required")),
            Some(raw) => raw.parse::<Language>()?,
        };
        Self::new(query.question, language, query.image)
    }
}

/// Check the payload and strip any data-URL prefix so upstreams get raw base64
fn normalize_image(image: ImagePayload) -> crate::Result<ImagePayload> {
    if !image.mime_type.starts_with("image/") {
        return Err(FieldSenseError::validation(format!(
            "unsupported image type '{}'",
            image.mime_type
        )));
    }
    // Tolerate data URLs pasted straight from a browser
    let data = image
        .data
        .split_once(";base64,")
        .map_or(image.data.as_str(), |(_, payload)| payload);
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| FieldSenseError::validation(format!("image data is not valid base64: {e}")))?;
    Ok(ImagePayload {
        data: data.trim().to_string(),
        mime_type: image.mime_type,
    })
}

/// Successful advisory answer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdvisoryResponse {
    pub text: String,
    /// Candidate model that produced the answer, or the manual-response marker
    #[serde(rename = "model")]
    pub model_used: String,
}

impl AdvisoryResponse {
    #[must_use]
    pub fn manual(text: String) -> Self {
        Self {
            text,
            model_used: MANUAL_RESPONSE_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.model_used == MANUAL_RESPONSE_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> ImagePayload {
        ImagePayload {
            data: "iVBORw0KGgo=".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_missing_language_is_rejected() {
        let query = AdvisoryQuery {
            question: Some("yellow leaves".into()),
            ..AdvisoryQuery::default()
        };
        let err = AdvisoryRequest::try_from(query).unwrap_err();
        assert!(matches!(err, FieldSenseError::Validation { .. }));
        assert!(err.to_string().contains("language is required"));
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let query = AdvisoryQuery {
            question: Some("yellow leaves".into()),
            language: Some("french".into()),
            image: None,
        };
        assert!(AdvisoryRequest::try_from(query).is_err());
    }

    #[test]
    fn test_blank_question_without_image_is_rejected() {
        let err = AdvisoryRequest::new(Some("   ".into()), Language::English, None).unwrap_err();
        assert!(err.to_string().contains("question is required"));
    }

    #[test]
    fn test_image_only_request_is_valid() {
        let request = AdvisoryRequest::new(None, Language::Hindi, Some(png())).unwrap();
        assert!(!request.is_text_only());
        assert_eq!(request.question(), None);
    }

    #[test]
    fn test_image_must_be_base64() {
        let mut image = png();
        image.data = "not base64 !!".into();
        assert!(AdvisoryRequest::new(None, Language::English, Some(image)).is_err());
    }

    #[test]
    fn test_image_data_url_prefix_is_accepted() {
        let mut image = png();
        image.data = format!("data:image/png;base64,{}", image.data);
        let request = AdvisoryRequest::new(None, Language::English, Some(image)).unwrap();
        assert_eq!(request.image().unwrap().data, "iVBORw0KGgo=");
    }

    #[test]
    fn test_image_must_be_an_image() {
        let mut image = png();
        image.mime_type = "application/pdf".into();
        assert!(AdvisoryRequest::new(None, Language::English, Some(image)).is_err());
    }

    #[test]
    fn test_response_serializes_model_field() {
        let response = AdvisoryResponse::manual("hello".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["model"], "manual-response");
        assert_eq!(json["text"], "hello");
    }
}
