use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{TranslationOutput, Translator};

/// OpenAI client for the chat completions API
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. https://api.openai.com/v1
    endpoint: String,
    /// System prompt template; `{target_language}` is substituted per call
    system_prompt: String,
    /// Sampling temperature
    temperature: f32,
    /// Smallest completion cap sent; larger chunks ask for more
    max_tokens: u32,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
    /// `stop`, or `length` when the completion cap cut the reply short
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

impl OpenAIRequest {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature,
            top_p: 1.0,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }
}

impl OpenAI {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        system_prompt: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            system_prompt: system_prompt.into(),
            temperature: 0.0,
            max_tokens: 1500,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn api_url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.openai.com/v1/chat/completions".to_string()
        } else {
            format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
        }
    }

    /// Complete a chat request
    pub async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let response = self
            .client
            .post(self.api_url())
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI API error ({}): {}", status, error_text);
            return Err(map_status_error(status, error_text, retry_after_secs));
        }

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from an OpenAI response
    pub fn extract_text_from_response(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .map(|c| c.message.content.trim().replace("\"\"\"", ""))
            .unwrap_or_default()
    }
}

/// Reject responses without a choice or cut off by the completion cap
fn check_finished(response: &OpenAIResponse, max_tokens: u32) -> Result<(), ProviderError> {
    let Some(choice) = response.choices.first() else {
        return Err(ProviderError::ModelError("Response contained no choices".to_string()));
    };
    if choice.finish_reason.as_deref() == Some("length") {
        return Err(ProviderError::IncompleteResponse(format!(
            "reply stopped at the {} token completion cap",
            max_tokens
        )));
    }
    Ok(())
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::ConnectionError(e.to_string())
    } else {
        ProviderError::RequestFailed(e.to_string())
    }
}

fn map_status_error(status: StatusCode, message: String, retry_after_secs: Option<u64>) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { message, retry_after_secs },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::ModelError(message)
        }
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Translator for OpenAI {
    async fn translate(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
    ) -> Result<TranslationOutput, ProviderError> {
        self.translate_with_limit(context_text, target_language, model, self.max_tokens)
            .await
    }

    async fn translate_with_limit(
        &self,
        context_text: &str,
        target_language: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<TranslationOutput, ProviderError> {
        let max_tokens = max_output_tokens.max(self.max_tokens);
        let system = self.system_prompt.replace("{target_language}", target_language);
        let request = OpenAIRequest::new(model, self.temperature, max_tokens)
            .add_message("system", system)
            .add_message("user", context_text);

        let response = self.complete(request).await?;
        check_finished(&response, max_tokens)?;

        let text = Self::extract_text_from_response(&response);
        debug!("OpenAI returned {} bytes (cap {} tokens)", text.len(), max_tokens);

        Ok(TranslationOutput {
            text,
            input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
        })
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        let request = OpenAIRequest::new(model, 0.0, 5).add_message("user", "Hello");
        self.complete(request).await?;
        Ok(())
    }
}
