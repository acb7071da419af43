/*!
 * Tests for application configuration functionality
 */

use texlate::app_config::{Config, LogLevel, TokenizerKind, TranslationProvider};
use texlate::translation::cost::ModelPrice;

use crate::common;

fn mock_config() -> Config {
    let mut config = Config::default();
    config.provider.provider_type = TranslationProvider::Mock;
    config
}

/// Test that a missing config file is created with defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config, Config::default());
    let written: Config = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, config);
}

/// Test that saved settings are read back unchanged
#[test]
fn test_load_or_create_withSavedFile_shouldRoundTrip() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    let mut config = mock_config();
    config.pipeline.max_concurrent_requests = 8;
    config.pipeline.chunking.overlap_tokens = 50;
    config.tokenizer = TokenizerKind::Word;
    config.log_level = LogLevel::Debug;
    config.pricing.models.insert("my-model".to_string(), ModelPrice::new(0.001, 0.002));
    config.save(&path).unwrap();

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(loaded, config);
}

/// Test that a malformed file is reported instead of replaced
#[test]
fn test_load_or_create_withMalformedFile_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    let err = Config::load_or_create(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

/// Test configuration validation of pipeline limits
#[test]
fn test_validate_withInvalidPipelineLimits_shouldReject() {
    let mut config = mock_config();
    assert!(config.validate().is_ok());

    config.pipeline.max_concurrent_requests = 0;
    assert!(config.validate().is_err());

    let mut config = mock_config();
    config.pipeline.retry.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = mock_config();
    config.pipeline.retry.max_backoff_ms = config.pipeline.retry.base_backoff_ms - 1;
    assert!(config.validate().is_err());

    let mut config = mock_config();
    config.pipeline.chunking.max_chunk_tokens = 0;
    assert!(config.validate().is_err());
}

/// Test provider and pricing validation
#[test]
fn test_validate_withInvalidProviderSettings_shouldReject() {
    let mut config = mock_config();
    config.provider.temperature = 2.5;
    assert!(config.validate().is_err());

    let mut config = mock_config();
    config.pricing.models.insert("gpt-4".to_string(), ModelPrice::new(-0.01, 0.06));
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("gpt-4"));
}

/// Test that partial JSON keeps defaults for everything else
#[test]
fn test_deserialize_withPartialSections_shouldFillDefaults() {
    let config: Config = serde_json::from_str(
        r#"{
            "provider": {"type": "mock", "temperature": 0.3},
            "pipeline": {"max_concurrent_requests": 2},
            "storage": {"public_base_url": "https://cdn.example.com"},
            "tokenizer": "word"
        }"#,
    )
    .unwrap();

    assert_eq!(config.provider.provider_type, TranslationProvider::Mock);
    assert_eq!(config.provider.max_tokens, 256);
    assert_eq!(config.pipeline.max_concurrent_requests, 2);
    assert_eq!(config.pipeline.chunking.max_chunk_tokens, 1000);
    assert_eq!(config.storage.public_base_url.as_deref(), Some("https://cdn.example.com"));
    assert_eq!(config.tokenizer, TokenizerKind::Word);
    assert!(config.pricing.models.contains_key("gpt-4o-mini"));
}
