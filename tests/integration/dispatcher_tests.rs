/*!
 * Integration tests for concurrent dispatch and retry
 */

use std::sync::Arc;

use futures::StreamExt;
use texlate::chunking::{ChunkBuilder, ChunkingConfig};
use texlate::markup::MarkupClassifier;
use texlate::providers::mock::{MockBehavior, MockProvider};
use texlate::tokenizer::{Tokenizer, WordTokenizer};
use texlate::translation::dispatcher::{ChunkOutcome, DispatchOptions, Dispatcher, RetryPolicy};

use crate::common::{self, distinct_words, mock_pipeline, pipeline_config};

/// In-flight requests never exceed the configured worker count
#[tokio::test]
async fn test_translate_withSlowProvider_shouldRespectConcurrencyLimit() {
    common::init_logger();
    let source = distinct_words(200);
    let provider = MockProvider::slow(30);
    let output = mock_pipeline(&provider, pipeline_config(20, 0))
        .translate(&source, "English", "gpt-4", |_, _| {})
        .await
        .unwrap();

    assert_eq!(output.chunk_count, 10);
    assert!(provider.max_in_flight() <= 3, "saw {} requests in flight", provider.max_in_flight());
    assert!(provider.max_in_flight() >= 2);
    assert_eq!(output.document, source.to_uppercase());
}

/// A single worker serializes requests
#[tokio::test]
async fn test_translate_withOneWorker_shouldSendRequestsOneAtATime() {
    let provider = MockProvider::slow(5);
    let mut config = pipeline_config(20, 0);
    config.max_concurrent_requests = 1;
    mock_pipeline(&provider, config)
        .translate(&distinct_words(100), "English", "gpt-4", |_, _| {})
        .await
        .unwrap();

    assert_eq!(provider.max_in_flight(), 1);
    assert_eq!(provider.request_count(), 5);
}

/// Throttled requests are retried after the suggested wait
#[tokio::test]
async fn test_translate_withRateLimit_shouldRetryUntilAccepted() {
    common::init_logger();
    let provider = MockProvider::new(MockBehavior::RateLimited { times: 2 });
    let mut config = pipeline_config(1000, 100);
    config.retry = RetryPolicy::immediate(4);
    let output = mock_pipeline(&provider, config)
        .translate("Hola mundo.", "English", "gpt-4", |_, _| {})
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 3);
    assert_eq!(output.document, "HOLA MUNDO.");
}

/// Non-retryable errors fail after a single attempt
#[tokio::test]
async fn test_dispatch_withFatalError_shouldNotRetry() {
    common::init_logger();
    let provider = MockProvider::new(MockBehavior::Fatal);
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::new());
    let document = MarkupClassifier::default().classify(&distinct_words(60)).document;
    let chunks = ChunkBuilder::new(
        Arc::clone(&tokenizer),
        ChunkingConfig {
            max_chunk_tokens: 20,
            overlap_tokens: 2,
            prefer_paragraph_breaks: false,
        },
    )
    .build(&document)
    .unwrap();

    let dispatcher = Dispatcher::new(
        Arc::new(provider.clone()),
        tokenizer,
        DispatchOptions {
            target_language: "German".to_string(),
            model: "gpt-4".to_string(),
            retry: RetryPolicy::immediate(5),
            max_concurrent_requests: 2,
            include_sample: false,
        },
    );
    let outcomes: Vec<ChunkOutcome> = dispatcher.dispatch(chunks).collect().await;

    assert_eq!(outcomes.len(), 4);
    let mut indices: Vec<usize> = outcomes.iter().map(|o| o.sequence_index()).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    for outcome in &outcomes {
        let ChunkOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(failure.attempts, 1);
        assert!(failure.message.contains("Authentication error"));
    }
    assert_eq!(provider.request_count(), 4);
}
