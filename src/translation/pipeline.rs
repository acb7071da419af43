/*!
 * End-to-end document translation.
 *
 * classify → chunk → dispatch → reassemble, with usage accounted as chunks
 * complete. The reassembler is owned by this future; outcomes from the
 * dispatcher stream are fed into it in completion order.
 */

use std::sync::Arc;

use futures::StreamExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::chunking::{ChunkBuilder, ChunkingConfig};
use crate::errors::{PartialTranslationError, PipelineError};
use crate::markup::{ClassificationWarning, MarkupClassifier};
use crate::providers::Translator;
use crate::tokenizer::Tokenizer;
use crate::translation::cost::{CostAccountant, CostReport, UsageRecord};
use crate::translation::dispatcher::{ChunkOutcome, DispatchOptions, Dispatcher, RetryPolicy};
use crate::translation::reassembly::{FidelityWarning, Reassembler, ReassemblyConfig, SeamWarning};

/// Pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Maximum number of concurrent requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Shortest echoed run, in tokens, removed at a seam
    #[serde(default = "default_min_seam_match")]
    pub min_seam_match: usize,

    /// Send the worked sample with every chunk
    #[serde(default = "default_include_sample")]
    pub include_sample: bool,
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_min_seam_match() -> usize {
    3
}

fn default_include_sample() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retry: RetryPolicy::default(),
            max_concurrent_requests: default_max_concurrent_requests(),
            min_seam_match: default_min_seam_match(),
            include_sample: default_include_sample(),
        }
    }
}

/// A fully translated document with its accounting
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: String,
    pub chunk_count: usize,
    pub usage: Vec<UsageRecord>,
    pub cost: CostReport,
    pub classification_warnings: Vec<ClassificationWarning>,
    pub fidelity_warnings: Vec<FidelityWarning>,
    pub seam_warnings: Vec<SeamWarning>,
}

/// Translates whole documents; holds no per-request state
#[derive(Debug, Clone)]
pub struct TranslationPipeline {
    classifier: MarkupClassifier,
    tokenizer: Arc<dyn Tokenizer>,
    translator: Arc<dyn Translator>,
    accountant: CostAccountant,
    config: PipelineConfig,
}

impl TranslationPipeline {
    pub fn new(
        classifier: MarkupClassifier,
        tokenizer: Arc<dyn Tokenizer>,
        translator: Arc<dyn Translator>,
        accountant: CostAccountant,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            tokenizer,
            translator,
            accountant,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Translate `source` into `target_language`
    ///
    /// `progress` is called with `(completed, total)` after each chunk reaches
    /// a terminal state.
    pub async fn translate(
        &self,
        source: &str,
        target_language: &str,
        model: &str,
        progress: impl Fn(usize, usize),
    ) -> Result<PipelineOutput, PipelineError> {
        let classification = self.classifier.classify(source);
        if !classification.warnings.is_empty() {
            warn!("{} construct(s) left unterminated in the source", classification.warnings.len());
        }

        let builder = ChunkBuilder::new(Arc::clone(&self.tokenizer), self.config.chunking.clone());
        let chunks = builder.build(&classification.document)?;
        let total = chunks.len();
        info!(
            "Document of {} bytes split into {} chunk(s) ({} spans)",
            source.len(),
            total,
            classification.document.spans().len()
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.translator),
            Arc::clone(&self.tokenizer),
            DispatchOptions {
                target_language: target_language.to_string(),
                model: model.to_string(),
                retry: self.config.retry.clone(),
                max_concurrent_requests: self.config.max_concurrent_requests,
                include_sample: self.config.include_sample,
            },
        );
        let mut reassembler = Reassembler::new(
            Arc::clone(&self.tokenizer),
            ReassemblyConfig {
                overlap_tokens: self.config.chunking.overlap_tokens,
                min_seam_match: self.config.min_seam_match,
            },
            total,
        );

        let mut usage = Vec::with_capacity(total);
        let mut succeeded = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut completed = 0;

        let mut outcomes = std::pin::pin!(dispatcher.dispatch(chunks));
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                ChunkOutcome::Succeeded { chunk, usage: record } => {
                    succeeded.push(chunk.sequence_index);
                    usage.push(record);
                    reassembler.accept(chunk);
                }
                ChunkOutcome::Failed(failure) => {
                    let core = source.get(failure.byte_range.clone()).unwrap_or_default();
                    reassembler.accept_source(failure.sequence_index, core);
                    failed.push(failure);
                }
            }
            completed += 1;
            progress(completed, total);
        }

        usage.sort_by_key(|r| r.sequence_index);
        succeeded.sort_unstable();
        failed.sort_by_key(|f| f.sequence_index);

        let reassembled = reassembler.finish()?;

        if !failed.is_empty() {
            return Err(PartialTranslationError {
                succeeded,
                failed,
                partial_document: reassembled.text,
                usage,
            }
            .into());
        }

        let cost = self.accountant.aggregate(&usage);
        info!(
            "Translated {} chunk(s): {} input / {} output tokens, cost ${:.6}",
            total, cost.total_input_tokens, cost.total_output_tokens, cost.total_cost
        );

        Ok(PipelineOutput {
            document: reassembled.text,
            chunk_count: total,
            usage,
            cost,
            classification_warnings: classification.warnings,
            fidelity_warnings: reassembled.fidelity_warnings,
            seam_warnings: reassembled.seam_warnings,
        })
    }
}
