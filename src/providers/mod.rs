/*!
 * Translation capability implementations.
 *
 * - `openai`: OpenAI chat completions API
 * - `mock`: scriptable provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Result of one translation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutput {
    /// Raw model reply
    pub text: String,
    /// Prompt tokens reported by the provider
    pub input_tokens: Option<u64>,
    /// Completion tokens reported by the provider
    pub output_tokens: Option<u64>,
}

/// Common trait for all translation providers
///
/// Implementations must be shareable across concurrently dispatched chunks.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate `context_text` into `target_language` using `model`
    ///
    /// # Returns
    /// * `Result<TranslationOutput, ProviderError>` - The reply and its token usage, or an error
    async fn translate(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslationOutput, ProviderError>;

    /// Translate with a cap on the reply length, in tokens
    ///
    /// Providers without a completion cap ignore `max_output_tokens`.
    async fn translate_with_limit(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<TranslationOutput, ProviderError> {
        let _ = max_output_tokens;
        self.translate(context_text, target_language, model).await
    }

    /// Test the connection to the provider
    async fn test_connection(&self, model: &str) -> Result<(), ProviderError>;
}

pub mod mock;
pub mod openai;
