//! Active UI language and the fixed strings localized by it
//!
//! [`LanguageStore`] is the single source of truth for the current language.
//! Every consumer holds a [`LanguageSubscription`]; dropping it unsubscribes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::FieldSenseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Hindi,
    English,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Hindi => "hindi",
            Language::English => "english",
        }
    }

    /// "Location unavailable" in this language
    #[must_use]
    pub fn location_unavailable(self) -> &'static str {
        match self {
            Language::Hindi => "स्थान उपलब्ध नहीं",
            Language::English => "Location unavailable",
        }
    }

    /// Dashboard salutation for a local hour of day (0..=23)
    #[must_use]
    pub fn salutation(self, hour: u32) -> &'static str {
        match (self, hour) {
            (Language::Hindi, 0..=11) => "सुप्रभात",
            (Language::Hindi, 12..=17) => "नमस्ते",
            (Language::Hindi, _) => "शुभ संध्या",
            (Language::English, 0..=11) => "Good morning",
            (Language::English, 12..=17) => "Hello",
            (Language::English, _) => "Good evening",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = FieldSenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hindi" | "hi" => Ok(Language::Hindi),
            "english" | "en" => Ok(Language::English),
            other => Err(FieldSenseError::validation(format!(
                "language must be 'hindi' or 'english', got '{other}'"
            ))),
        }
    }
}

/// Process-wide language state with explicit publish/subscribe
#[derive(Debug, Clone)]
pub struct LanguageStore {
    sender: Arc<watch::Sender<Language>>,
}

/// A live view of the store; drop it to unsubscribe
#[derive(Debug)]
pub struct LanguageSubscription {
    receiver: watch::Receiver<Language>,
}

impl LanguageStore {
    #[must_use]
    pub fn new(initial: Language) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    #[must_use]
    pub fn current(&self) -> Language {
        *self.sender.borrow()
    }

    /// Publish a new language. Returns false when it was already active.
    pub fn set(&self, language: Language) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == language {
                false
            } else {
                *current = language;
                true
            }
        });
        if changed {
            tracing::info!(%language, subscribers = self.sender.receiver_count(), "Language changed");
        }
        changed
    }

    #[must_use]
    pub fn subscribe(&self) -> LanguageSubscription {
        LanguageSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LanguageStore {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl LanguageSubscription {
    #[must_use]
    pub fn current(&self) -> Language {
        *self.receiver.borrow()
    }

    /// Wait for the next change and return the new language
    pub async fn changed(&mut self) -> Option<Language> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }
}
