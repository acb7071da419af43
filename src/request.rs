/*!
 * Translate request payload and its validation.
 *
 * Requests are validated before any document is fetched or chunked; a bad
 * field is reported as `RequestError::InvalidField`.
 */

use serde::{Deserialize, Serialize};

use crate::errors::RequestError;
use crate::language_utils::TargetLanguage;

/// Smallest accepted `max_len`
pub const MIN_MAX_LEN: usize = 1000;
/// Largest accepted `max_len`
pub const MAX_MAX_LEN: usize = 5000;
/// Largest accepted `num_pages`
pub const MAX_PAGES: u32 = 20;

/// Chat models a request may name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TranslationModel {
    #[default]
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl TranslationModel {
    pub const ALL: [TranslationModel; 4] = [Self::Gpt4, Self::Gpt4o, Self::Gpt4oMini, Self::Gpt35Turbo];

    /// Model identifier sent to the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl std::fmt::Display for TranslationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TranslationModel {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| RequestError::InvalidField {
                field: "model",
                message: format!("'{}' is not one of {:?}", s, Self::ALL.map(|m| m.as_str())),
            })
    }
}

fn default_max_len() -> usize {
    MIN_MAX_LEN
}

/// A request to translate one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRequest {
    /// Where to fetch the LaTeX source from
    pub file_url: String,

    /// Token limit of each chunk core
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    #[serde(default)]
    pub dest_language: TargetLanguage,

    #[serde(default)]
    pub model: TranslationModel,

    /// Translate only the first N pages
    #[serde(default)]
    pub num_pages: Option<u32>,
}

impl TranslateRequest {
    /// Request with every optional field at its default
    pub fn new(file_url: impl Into<String>) -> Self {
        Self {
            file_url: file_url.into(),
            max_len: default_max_len(),
            dest_language: TargetLanguage::default(),
            model: TranslationModel::default(),
            num_pages: None,
        }
    }

    /// Parse and validate a JSON request body
    pub fn from_json(body: &str) -> Result<Self, RequestError> {
        let request: Self = serde_json::from_str(body).map_err(|e| RequestError::InvalidField {
            field: "body",
            message: e.to_string(),
        })?;
        request.validate()?;
        Ok(request)
    }

    /// Check every field against its accepted range
    pub fn validate(&self) -> Result<(), RequestError> {
        let file_url = self.file_url.trim();
        if file_url.is_empty() {
            return Err(RequestError::InvalidField {
                field: "file_url",
                message: "must not be empty".to_string(),
            });
        }
        if file_url.contains("://") {
            url::Url::parse(file_url).map_err(|e| RequestError::InvalidField {
                field: "file_url",
                message: e.to_string(),
            })?;
        }

        if !(MIN_MAX_LEN..=MAX_MAX_LEN).contains(&self.max_len) {
            return Err(RequestError::InvalidField {
                field: "max_len",
                message: format!("{} is outside {}..={}", self.max_len, MIN_MAX_LEN, MAX_MAX_LEN),
            });
        }

        if let Some(pages) = self.num_pages {
            if !(1..=MAX_PAGES).contains(&pages) {
                return Err(RequestError::InvalidField {
                    field: "num_pages",
                    message: format!("{} is outside 1..={}", pages, MAX_PAGES),
                });
            }
        }

        Ok(())
    }
}
