use anyhow::{Result, anyhow};
use isolang::Language;
use serde::{Deserialize, Serialize};

/// Destination languages accepted at the request boundary.
///
/// A language may be given by English name ("Spanish") or by ISO 639-1 /
/// 639-3 code ("es", "spa"); codes are resolved through isolang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetLanguage {
    #[default]
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 6] = [
        Self::English,
        Self::Spanish,
        Self::French,
        Self::German,
        Self::Italian,
        Self::Portuguese,
    ];

    /// English name used in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Italian => "Italian",
            Self::Portuguese => "Portuguese",
        }
    }

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::German => "de",
            Self::Italian => "it",
            Self::Portuguese => "pt",
        }
    }

    fn from_iso(language: Language) -> Option<Self> {
        let code = language.to_639_1()?;
        Self::ALL.into_iter().find(|l| l.code() == code)
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();

        if let Some(lang) = Self::ALL.into_iter().find(|l| l.name().to_lowercase() == normalized) {
            return Ok(lang);
        }

        let iso = match normalized.len() {
            2 => Language::from_639_1(&normalized),
            3 => Language::from_639_3(&normalized),
            _ => None,
        };

        iso.and_then(Self::from_iso)
            .ok_or_else(|| anyhow!("Unsupported destination language: {}", s))
    }
}
