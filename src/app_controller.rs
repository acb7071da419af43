use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app_config::{Config, TokenizerKind, TranslationProvider};
use crate::errors::{AppError, PipelineError};
use crate::markup::MarkupClassifier;
use crate::providers::Translator;
use crate::providers::mock::MockProvider;
use crate::providers::openai::OpenAI;
use crate::request::TranslateRequest;
use crate::source::{DocumentSource, UrlSource, truncate_pages};
use crate::storage::{FileStorage, Storage};
use crate::tokenizer::{BpeTokenizer, Tokenizer, WordTokenizer};
use crate::translation::cost::CostAccountant;
use crate::translation::pipeline::{PipelineOutput, TranslationPipeline};

// @module: Application controller for document translation requests

/// Successful translation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub message: String,
    pub translated_file_url: String,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub chunk_count: usize,
    /// Protected spans that had to be repaired after translation
    pub fidelity_warnings: usize,
    /// Chunk seams where overlap could not be aligned
    pub seam_warnings: usize,
}

/// Failure payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_chunks: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_file_url: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::PartialResult { source, partial_file_url } => Self {
                error: error.to_string(),
                failed_chunks: source.failed_indices(),
                partial_file_url: Some(partial_file_url.clone()),
            },
            AppError::Pipeline(PipelineError::PartialTranslation(partial)) => Self {
                error: error.to_string(),
                failed_chunks: partial.failed_indices(),
                partial_file_url: None,
            },
            _ => Self {
                error: error.to_string(),
                failed_chunks: Vec::new(),
                partial_file_url: None,
            },
        }
    }
}

/// Main application controller for document translation
#[derive(Debug)]
pub struct Controller {
    // @field: App configuration
    config: Config,
    translator: Arc<dyn Translator>,
    tokenizer: Arc<dyn Tokenizer>,
    storage: Arc<dyn Storage>,
    source: Arc<dyn DocumentSource>,
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let translator: Arc<dyn Translator> = match config.provider.provider_type {
            TranslationProvider::OpenAI => Arc::new(
                OpenAI::new(
                    config.provider.get_api_key(),
                    config.provider.endpoint.clone(),
                    config.provider.system_prompt.clone(),
                    config.provider.timeout_secs,
                )
                .with_sampling(config.provider.temperature, config.provider.max_tokens),
            ),
            TranslationProvider::Mock => Arc::new(MockProvider::working()),
        };

        let tokenizer: Arc<dyn Tokenizer> = match config.tokenizer {
            TokenizerKind::Gpt2 => Arc::new(BpeTokenizer::gpt2().context("Failed to load GPT-2 tokenizer")?),
            TokenizerKind::Word => Arc::new(WordTokenizer::new()),
        };

        let storage = Arc::new(FileStorage::new(
            config.storage.output_dir.clone(),
            config.storage.public_base_url.clone(),
        ));
        let source = Arc::new(UrlSource::new(config.provider.timeout_secs));

        info!(
            "Using {} provider with {} tokenizer",
            config.provider.provider_type.display_name(),
            tokenizer.name()
        );

        Ok(Self::with_components(config, translator, tokenizer, storage, source))
    }

    /// Assemble a controller from explicit components
    pub fn with_components(
        config: Config,
        translator: Arc<dyn Translator>,
        tokenizer: Arc<dyn Tokenizer>,
        storage: Arc<dyn Storage>,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            config,
            translator,
            tokenizer,
            storage,
            source,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while chunks are translated
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the provider answers before starting a long run
    pub async fn test_connection(&self, request: &TranslateRequest) -> Result<()> {
        self.translator
            .test_connection(request.model.as_str())
            .await
            .with_context(|| format!("{} provider is not reachable", self.config.provider.provider_type.display_name()))
    }

    /// Handle one translate request end to end
    pub async fn translate(&self, request: &TranslateRequest) -> Result<TranslateResponse, AppError> {
        let start_time = std::time::Instant::now();
        request.validate()?;

        let fetched = self.source.fetch(&request.file_url).await?;
        let text = match request.num_pages {
            Some(pages) => truncate_pages(&fetched, pages as usize),
            None => fetched.as_str(),
        };
        debug!("Translating {} of {} fetched bytes", text.len(), fetched.len());

        let pipeline = self.build_pipeline(request);
        let progress_bar = self.progress_bar();
        let result = pipeline
            .translate(
                text,
                request.dest_language.name(),
                request.model.as_str(),
                |completed, total| {
                    progress_bar.set_length(total as u64);
                    progress_bar.set_position(completed as u64);
                },
            )
            .await;
        progress_bar.finish_and_clear();

        let output = match result {
            Ok(output) => output,
            Err(PipelineError::PartialTranslation(partial)) => {
                error!(
                    "{} chunk(s) failed; storing partial document",
                    partial.failed.len()
                );
                let partial_file_url = self.storage.store(partial.partial_document.as_bytes()).await?;
                return Err(AppError::PartialResult {
                    source: partial,
                    partial_file_url,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let translated_file_url = self.storage.store(output.document.as_bytes()).await?;
        info!(
            "Translation completed in {}.",
            Self::format_duration(start_time.elapsed())
        );
        Ok(Self::respond(output, translated_file_url))
    }

    fn build_pipeline(&self, request: &TranslateRequest) -> TranslationPipeline {
        let mut pipeline_config = self.config.pipeline.clone();
        pipeline_config.chunking.max_chunk_tokens = request.max_len;
        if pipeline_config.chunking.overlap_tokens >= request.max_len {
            let clamped = request.max_len / 10;
            warn!(
                "Overlap of {} tokens does not fit max_len {}, using {}",
                pipeline_config.chunking.overlap_tokens, request.max_len, clamped
            );
            pipeline_config.chunking.overlap_tokens = clamped;
        }

        TranslationPipeline::new(
            MarkupClassifier::new(&self.config.markup),
            Arc::clone(&self.tokenizer),
            Arc::clone(&self.translator),
            CostAccountant::new(self.config.pricing.clone()),
            pipeline_config,
        )
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar
    }

    fn respond(output: PipelineOutput, translated_file_url: String) -> TranslateResponse {
        if !output.fidelity_warnings.is_empty() || !output.seam_warnings.is_empty() {
            warn!(
                "Completed with {} fidelity and {} seam warning(s)",
                output.fidelity_warnings.len(),
                output.seam_warnings.len()
            );
        }
        info!("🔢 {}", output.cost.summary());

        TranslateResponse {
            message: "File translated successfully".to_string(),
            translated_file_url,
            total_input_tokens: output.cost.total_input_tokens,
            total_output_tokens: output.cost.total_output_tokens,
            total_cost: output.cost.total_cost,
            chunk_count: output.chunk_count,
            fidelity_warnings: output.fidelity_warnings.len(),
            seam_warnings: output.seam_warnings.len(),
        }
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
