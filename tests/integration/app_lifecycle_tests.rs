/*!
 * Full app lifecycle tests: request, fetch, translate, store, respond
 */

use std::sync::Arc;

use texlate::app_config::{Config, TokenizerKind, TranslationProvider};
use texlate::app_controller::{Controller, ErrorResponse};
use texlate::errors::{AppError, RequestError};
use texlate::language_utils::TargetLanguage;
use texlate::providers::mock::MockProvider;
use texlate::request::{TranslateRequest, TranslationModel};
use texlate::source::UrlSource;
use texlate::storage::FileStorage;
use texlate::tokenizer::WordTokenizer;
use texlate::translation::dispatcher::RetryPolicy;
use url::Url;

use crate::common;

const SOURCE: &str = "\\section{Introducción}\nEl valor de \\(x\\) es positivo.\n\\newpage\n\\section{Resultados}\nTodo funciona.\n";

fn controller(provider: &MockProvider, output_dir: &std::path::Path) -> Controller {
    let mut config = Config::default();
    config.provider.provider_type = TranslationProvider::Mock;
    config.tokenizer = TokenizerKind::Word;
    config.pipeline.retry = RetryPolicy::immediate(2);
    Controller::with_components(
        config,
        Arc::new(provider.clone()),
        Arc::new(WordTokenizer::new()),
        Arc::new(FileStorage::new(output_dir, None)),
        Arc::new(UrlSource::default()),
    )
}

fn read_url(url: &str) -> String {
    let path = Url::parse(url).unwrap().to_file_path().unwrap();
    std::fs::read_to_string(path).unwrap()
}

/// Test a full request from a local file to a stored translation
#[tokio::test]
async fn test_translate_withLocalFile_shouldStoreTranslationAndReportCost() {
    common::init_logger();
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "paper.tex", SOURCE).unwrap();
    let provider = MockProvider::working();

    let mut request = TranslateRequest::new(input.to_string_lossy());
    request.model = TranslationModel::Gpt4oMini;
    let response = controller(&provider, &dir.path().join("out")).translate(&request).await.unwrap();

    assert_eq!(response.chunk_count, 1);
    assert!(response.translated_file_url.starts_with("file://"));
    assert!(response.total_input_tokens > 0);
    assert!(response.total_cost > 0.0);
    assert_eq!(response.fidelity_warnings, 0);

    let stored = read_url(&response.translated_file_url);
    assert!(stored.contains("\\section{INTRODUCCIÓN}"));
    assert!(stored.contains("\\(x\\)"));
    assert!(stored.contains("\\newpage"));
    assert!(stored.contains("TODO FUNCIONA."));
}

/// Test that num_pages drops everything after the first page break
#[tokio::test]
async fn test_translate_withPageLimit_shouldOnlyTranslateFirstPage() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "paper.tex", SOURCE).unwrap();
    let provider = MockProvider::working();

    let mut request = TranslateRequest::new(Url::from_file_path(&input).unwrap().to_string());
    request.num_pages = Some(1);
    request.dest_language = TargetLanguage::French;
    let response = controller(&provider, dir.path()).translate(&request).await.unwrap();

    let stored = read_url(&response.translated_file_url);
    assert_eq!(stored, "\\section{INTRODUCCIÓN}\nEL VALOR DE \\(x\\) ES POSITIVO.\n");
}

/// Test that invalid requests are rejected before any provider call
#[tokio::test]
async fn test_translate_withInvalidRequest_shouldRejectBeforeTranslating() {
    let dir = common::create_temp_dir().unwrap();
    let provider = MockProvider::working();
    let mut request = TranslateRequest::new("paper.tex");
    request.max_len = 10;

    let err = controller(&provider, dir.path()).translate(&request).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Request(RequestError::InvalidField { field: "max_len", .. })
    ));
    assert_eq!(provider.request_count(), 0);
}

/// Test that an unreachable document is reported as a fetch error
#[tokio::test]
async fn test_translate_withMissingFile_shouldReportFetchError() {
    let dir = common::create_temp_dir().unwrap();
    let provider = MockProvider::working();
    let request = TranslateRequest::new(dir.path().join("missing.tex").to_string_lossy());

    let err = controller(&provider, dir.path()).translate(&request).await.unwrap_err();
    assert!(matches!(err, AppError::Request(RequestError::Fetch(_))));
    let payload = ErrorResponse::from(&err);
    assert!(payload.error.contains("Failed to download"));
    assert!(payload.partial_file_url.is_none());
}

/// Test that a failed chunk still produces a stored partial document
#[tokio::test]
async fn test_translate_withFailingChunk_shouldStorePartialDocument() {
    common::init_logger();
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "paper.tex", SOURCE).unwrap();
    let provider = MockProvider::fail_on("Resultados");

    let request = TranslateRequest::new(input.to_string_lossy());
    let err = controller(&provider, &dir.path().join("out")).translate(&request).await.unwrap_err();

    let payload = ErrorResponse::from(&err);
    assert_eq!(payload.failed_chunks, vec![0]);
    let partial_url = payload.partial_file_url.clone().expect("partial document should be stored");
    assert_eq!(read_url(&partial_url), SOURCE);

    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["failed_chunks"], serde_json::json!([0]));
}

/// Test building a controller straight from configuration
#[tokio::test]
async fn test_with_config_withMockProvider_shouldTranslate() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "paper.tex", "Hola.").unwrap();

    let mut config = Config::default();
    config.provider.provider_type = TranslationProvider::Mock;
    config.tokenizer = TokenizerKind::Word;
    config.storage.output_dir = dir.path().join("out");
    config.storage.public_base_url = Some("https://files.example.com/tex".to_string());
    let controller = Controller::with_config(config).unwrap();

    let request = TranslateRequest::new(input.to_string_lossy());
    controller.test_connection(&request).await.unwrap();
    let response = controller.translate(&request).await.unwrap();
    assert!(response.translated_file_url.starts_with("https://files.example.com/tex/translated_content_"));
    assert_eq!(response.message, "File translated successfully");

    let stored: Vec<_> = std::fs::read_dir(dir.path().join("out")).unwrap().collect();
    assert_eq!(stored.len(), 1);
}

/// Test that a config without an API key cannot build an OpenAI controller
#[test]
fn test_with_config_withOpenAIAndNoKey_shouldFail() {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        return;
    }
    let result = tokio_test::block_on(async { Controller::with_config(Config::default()) });
    assert!(result.is_err());
}
