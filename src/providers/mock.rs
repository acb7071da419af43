/*!
 * Mock provider implementations for testing.
 *
 * The working mock "translates" by upper-casing the prose of the core while
 * copying every protected construct verbatim, which is enough to observe
 * ordering, markup fidelity and token accounting without a network.
 *
 * - `MockProvider::working()` - Always succeeds, replies with core markers
 * - `MockProvider::unmarked()` - Succeeds but echoes the leading context and omits markers
 * - `MockProvider::intermittent(n)` - Every nth request fails with a 503 (never when n is 0)
 * - `MockProvider::empty()` - Succeeds with an empty reply
 * - `MockProvider::failing()` - Always fails with a transient error
 * - `MockProvider::fail_on("needle")` - Fails with a timeout when the core contains `needle`
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::markup::MarkupClassifier;
use crate::providers::{TranslationOutput, Translator};
use crate::translation::prompts::{CONTEXT_BEFORE, CONTEXT_END, CORE_END, CORE_START, marked_core};

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// Full context text sent by the dispatcher
    pub context_text: String,
    /// Target language name
    pub target_language: String,
    /// Model identifier
    pub model: String,
}

impl MockRequest {
    /// The text between the core markers, or the whole context text
    pub fn core(&self) -> &str {
        marked_core(&self.context_text).unwrap_or(&self.context_text)
    }

    /// The read-only preceding context, if any
    pub fn leading_context(&self) -> Option<&str> {
        let start = self.context_text.find(CONTEXT_BEFORE)? + CONTEXT_BEFORE.len();
        let end = start + self.context_text[start..].find(CONTEXT_END)?;
        let body = &self.context_text[start..end];
        let body = body.strip_prefix('\n').unwrap_or(body);
        Some(body.strip_suffix('\n').unwrap_or(body))
    }
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a marked translation
    Working,
    /// Succeeds, but echoes the translated leading context and omits markers
    Unmarked,
    /// Succeeds, but drops every protected construct from the translation
    DropProtected,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Throttles the first N requests, suggesting a zero-second wait
    RateLimited { times: usize },
    /// Always fails with a transient error
    Failing,
    /// Always fails with a non-retryable error
    Fatal,
    /// Times out whenever the core contains the needle
    FailOn { needle: &'static str },
    /// Returns an empty reply
    Empty,
    /// Simulates slow response
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Requests currently being served
    in_flight: Arc<AtomicUsize>,
    /// Highest concurrent request count observed
    max_in_flight: Arc<AtomicUsize>,
    /// Largest completion cap requested
    max_output_cap: Arc<AtomicUsize>,
    /// Whether token usage is reported back
    report_usage: bool,
    /// Custom response generator (optional)
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            max_output_cap: Arc::new(AtomicUsize::new(0)),
            report_usage: true,
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that replies without core markers
    pub fn unmarked() -> Self {
        Self::new(MockBehavior::Unmarked)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a mock that answers with an empty reply
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that fails for any core containing `needle`
    pub fn fail_on(needle: &'static str) -> Self {
        Self::new(MockBehavior::FailOn { needle })
    }

    /// Create a mock that sleeps before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Stop reporting token usage, forcing the caller to count tokens itself
    pub fn without_usage(mut self) -> Self {
        self.report_usage = false;
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of requests served at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Largest `max_output_tokens` passed to `translate_with_limit`
    pub fn max_output_cap(&self) -> usize {
        self.max_output_cap.load(Ordering::SeqCst)
    }

    /// Upper-case the prose of `text`, leaving protected constructs untouched
    pub fn simulate_translation(text: &str) -> String {
        MarkupClassifier::default()
            .classify(text)
            .document
            .spans()
            .iter()
            .map(|span| {
                if span.is_protected() {
                    span.text.clone()
                } else {
                    span.text.to_uppercase()
                }
            })
            .collect()
    }

    /// Translated prose only, with every protected construct removed
    pub fn simulate_lossy_translation(text: &str) -> String {
        MarkupClassifier::default()
            .classify(text)
            .document
            .spans()
            .iter()
            .filter(|span| !span.is_protected())
            .map(|span| span.text.to_uppercase())
            .collect()
    }

    /// Wrap a reply in core markers
    pub fn marked(body: &str) -> String {
        format!("{CORE_START}\n{body}\n{CORE_END}")
    }

    async fn respond(&self, request: &MockRequest, count: usize) -> Result<String, ProviderError> {
        if let Some(generator) = self.custom_response {
            return Ok(generator(request));
        }

        match self.behavior {
            MockBehavior::Working => Ok(Self::marked(&Self::simulate_translation(request.core()))),

            MockBehavior::Unmarked => {
                let mut reply = String::new();
                if let Some(leading) = request.leading_context() {
                    reply.push_str(&Self::simulate_translation(leading));
                }
                reply.push_str(&Self::simulate_translation(request.core()));
                Ok(reply)
            }

            MockBehavior::DropProtected => Ok(Self::marked(&Self::simulate_lossy_translation(request.core()))),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::marked(&Self::simulate_translation(request.core())))
                }
            }

            MockBehavior::RateLimited { times } => {
                if count < times {
                    Err(ProviderError::RateLimited {
                        message: "Simulated rate limit".to_string(),
                        retry_after_secs: Some(0),
                    })
                } else {
                    Ok(Self::marked(&Self::simulate_translation(request.core())))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Fatal => Err(ProviderError::AuthenticationError("Simulated invalid API key".to_string())),

            MockBehavior::FailOn { needle } => {
                if request.core().contains(needle) {
                    Err(ProviderError::Timeout(format!("Simulated timeout on '{}'", needle)))
                } else {
                    Ok(Self::marked(&Self::simulate_translation(request.core())))
                }
            }

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(Self::marked(&Self::simulate_translation(request.core())))
            }
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            in_flight: Arc::clone(&self.in_flight),
            max_in_flight: Arc::clone(&self.max_in_flight),
            max_output_cap: Arc::clone(&self.max_output_cap),
            report_usage: self.report_usage,
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Translator for MockProvider {
    async fn translate(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslationOutput, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let request = MockRequest {
            context_text: context_text.to_string(),
            target_language: target_language.to_string(),
            model: model.to_string(),
        };
        let result = self.respond(&request, count).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = result?;
        let (input_tokens, output_tokens) = if self.report_usage {
            (
                Some(context_text.split_whitespace().count() as u64),
                Some(text.split_whitespace().count() as u64),
            )
        } else {
            (None, None)
        };

        Ok(TranslationOutput {
            text,
            input_tokens,
            output_tokens,
        })
    }

    async fn translate_with_limit(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<TranslationOutput, ProviderError> {
        self.max_output_cap
            .fetch_max(max_output_tokens as usize, Ordering::SeqCst);
        self.translate(context_text, target_language, model).await
    }

    async fn test_connection(&self, _model: &str) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing | MockBehavior::Fatal => Err(ProviderError::ConnectionError(
                "Simulated connection failure".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
