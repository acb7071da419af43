use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::markup::MarkupPatterns;
use crate::translation::cost::PriceTable;
use crate::translation::pipeline::PipelineConfig;
use crate::translation::prompts::DEFAULT_SYSTEM_PROMPT;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Translation provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Chunking, retry and concurrency settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Which LaTeX constructs are protected
    #[serde(default)]
    pub markup: MarkupPatterns,

    /// Model prices
    #[serde(default)]
    pub pricing: PriceTable,

    /// Where translated documents are written
    #[serde(default)]
    pub storage: StorageConfig,

    /// Token counting strategy
    #[serde(default)]
    pub tokenizer: TokenizerKind,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI chat completions
    #[default]
    OpenAI,
    // @provider: Offline mock that upper-cases prose
    Mock,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type", default)]
    pub provider_type: TranslationProvider,

    // @field: API key; falls back to OPENAI_API_KEY when empty
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Temperature parameter for text generation (0.0 to 2.0)
    #[serde(default)]
    pub temperature: f32,

    /// Smallest completion cap; each request asks for room sized from its chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt template for translation
    /// Placeholders: {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: TranslationProvider::default(),
            api_key: String::new(),
            endpoint: default_openai_endpoint(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl ProviderConfig {
    /// Get the API key, reading the environment when none is configured
    pub fn get_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var("OPENAI_API_KEY").unwrap_or_default()
    }
}

/// Storage sink configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory translated documents are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Base URL the output directory is published under; `file://` URLs are returned when absent
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            public_base_url: None,
        }
    }
}

/// Token counting strategy
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// GPT-2 byte-pair encoding
    #[default]
    Gpt2,
    /// One token per pre-tokenized word or symbol run
    Word,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    256
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("translated")
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderConfig::default(),
            pipeline: PipelineConfig::default(),
            markup: MarkupPatterns::default(),
            pricing: PriceTable::default(),
            storage: StorageConfig::default(),
            tokenizer: TokenizerKind::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, writing the default one there if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            warn!("Config file not found at '{}', creating default config.", path.display());
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.pipeline.chunking;
        if chunking.max_chunk_tokens == 0 {
            return Err(anyhow!("pipeline.chunking.max_chunk_tokens must be greater than zero"));
        }
        if chunking.overlap_tokens >= chunking.max_chunk_tokens {
            return Err(anyhow!(
                "pipeline.chunking.overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                chunking.overlap_tokens,
                chunking.max_chunk_tokens
            ));
        }

        let retry = &self.pipeline.retry;
        if retry.max_attempts == 0 {
            return Err(anyhow!("pipeline.retry.max_attempts must be at least 1"));
        }
        if retry.max_backoff_ms < retry.base_backoff_ms {
            return Err(anyhow!("pipeline.retry.max_backoff_ms must not be smaller than base_backoff_ms"));
        }
        if self.pipeline.max_concurrent_requests == 0 {
            return Err(anyhow!("pipeline.max_concurrent_requests must be at least 1"));
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(anyhow!("provider.temperature must be between 0.0 and 2.0"));
        }

        let negative_price = self
            .pricing
            .models
            .iter()
            .find(|(_, p)| p.input_per_1k < 0.0 || p.output_per_1k < 0.0)
            .map(|(name, _)| name.clone());
        if let Some(model) = negative_price {
            return Err(anyhow!("pricing for model '{}' must not be negative", model));
        }
        if self.pricing.fallback_per_1k < 0.0 {
            return Err(anyhow!("pricing.fallback_per_1k must not be negative"));
        }

        // Validate API key for remote providers
        if self.provider.provider_type == TranslationProvider::OpenAI && self.provider.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for OpenAI provider (set provider.api_key or OPENAI_API_KEY)"
            ));
        }

        Ok(())
    }
}
