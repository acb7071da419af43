/*!
 * Concurrent chunk dispatch with per-chunk retry.
 *
 * Every chunk is driven through a small state machine until it is either
 * SUCCEEDED or FAILED. Chunks run concurrently up to a worker limit and are
 * yielded in completion order; a failed chunk never cancels its siblings.
 */

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use log::{debug, error, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::errors::{ChunkFailure, ProviderError, TranslationError};
use crate::markup::Span;
use crate::providers::Translator;
use crate::tokenizer::Tokenizer;
use crate::translation::cost::UsageRecord;
use crate::translation::prompts::{PromptBuilder, extract_core};

/// Retry behaviour for transient provider errors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per chunk, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff time in milliseconds for exponential backoff
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Upper bound for a single backoff
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Add up to a quarter of the delay as random jitter
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: false,
        }
    }

    /// Wait before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        if let Some(secs) = error.retry_after_secs() {
            return Duration::from_secs(secs);
        }

        let shift = attempt.saturating_sub(1).min(20);
        let backoff_ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);

        let jitter_ms = if self.jitter && backoff_ms >= 4 {
            rand::rng().random_range(0..=backoff_ms / 4)
        } else {
            0
        };

        Duration::from_millis(backoff_ms + jitter_ms)
    }
}

/// Lifecycle of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkState {
    /// A request for `attempt` is in flight
    Dispatched { attempt: u32 },
    /// `attempt` failed transiently; the next one starts after `delay`
    Retrying { attempt: u32, delay: Duration },
    /// Terminal
    Succeeded { attempts: u32 },
    /// Terminal
    Failed { attempts: u32 },
}

impl ChunkState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Transition after a dispatched attempt finished
    ///
    /// Any state other than `Dispatched` is returned unchanged.
    pub fn after_attempt(&self, result: Result<(), &ProviderError>, policy: &RetryPolicy) -> ChunkState {
        let Self::Dispatched { attempt } = *self else {
            return self.clone();
        };

        match result {
            Ok(()) => Self::Succeeded { attempts: attempt },
            Err(e) if e.is_transient() && attempt < policy.max_attempts => Self::Retrying {
                attempt,
                delay: policy.delay_for(attempt, e),
            },
            Err(_) => Self::Failed { attempts: attempt },
        }
    }

    /// Leave `Retrying` once the backoff has elapsed
    pub fn resume(&self) -> ChunkState {
        match *self {
            Self::Retrying { attempt, .. } => Self::Dispatched { attempt: attempt + 1 },
            _ => self.clone(),
        }
    }
}

/// A chunk whose translation came back successfully
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedChunk {
    pub sequence_index: usize,
    pub translated_core: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Core spans of the source chunk, used for protected-span verification
    pub source_spans: Vec<Span>,
    /// Whether the reply kept the core markers
    pub markers_found: bool,
    pub byte_range: Range<usize>,
}

impl TranslatedChunk {
    /// Source text of the chunk core
    pub fn source_core(&self) -> String {
        self.source_spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Terminal result of one chunk
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Succeeded { chunk: TranslatedChunk, usage: UsageRecord },
    Failed(ChunkFailure),
}

impl ChunkOutcome {
    pub fn sequence_index(&self) -> usize {
        match self {
            Self::Succeeded { chunk, .. } => chunk.sequence_index,
            Self::Failed(failure) => failure.sequence_index,
        }
    }
}

/// Parameters of one dispatch run
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub target_language: String,
    pub model: String,
    pub retry: RetryPolicy,
    pub max_concurrent_requests: usize,
    pub include_sample: bool,
}

/// Sends chunks to a translator concurrently
#[derive(Debug, Clone)]
pub struct Dispatcher {
    translator: Arc<dyn Translator>,
    tokenizer: Arc<dyn Tokenizer>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(translator: Arc<dyn Translator>, tokenizer: Arc<dyn Tokenizer>, options: DispatchOptions) -> Self {
        Self {
            translator,
            tokenizer,
            options,
        }
    }

    /// Translate all chunks, yielding each terminal outcome as it completes
    pub fn dispatch(&self, chunks: Vec<Chunk>) -> impl Stream<Item = ChunkOutcome> + '_ {
        let workers = self.options.max_concurrent_requests.max(1);
        info!("Dispatching {} chunk(s) with {} worker(s)", chunks.len(), workers);

        stream::iter(chunks)
            .map(move |chunk| self.run_chunk(chunk))
            .buffer_unordered(workers)
    }

    /// Drive one chunk to a terminal state
    pub async fn run_chunk(&self, chunk: Chunk) -> ChunkOutcome {
        let mut builder = PromptBuilder::new(self.options.target_language.clone());
        if !self.options.include_sample {
            builder = builder.without_sample();
        }
        let context_text = builder.build(&chunk);
        let index = chunk.sequence_index;
        let policy = &self.options.retry;
        let budget = reply_budget(&chunk);

        let mut state = ChunkState::Dispatched { attempt: 1 };
        let mut attempt = 1;
        loop {
            if let ChunkState::Retrying { delay, .. } = state {
                tokio::time::sleep(delay).await;
                state = state.resume();
            }
            if let ChunkState::Dispatched { attempt: current } = state {
                attempt = current;
            }
            debug!("Chunk {} dispatched (attempt {}/{})", index, attempt, policy.max_attempts);

            let result = self
                .translator
                .translate_with_limit(&context_text, &self.options.target_language, &self.options.model, budget)
                .await
                .and_then(|output| {
                    let (translated_core, markers_found) = accept_reply(&chunk, &output.text)?;
                    Ok((output, translated_core, markers_found))
                });

            state = state.after_attempt(result.as_ref().map(|_| ()), policy);
            match (state.clone(), result) {
                (ChunkState::Succeeded { .. }, Ok((output, translated_core, markers_found))) => {
                    if !markers_found {
                        warn!("Chunk {}: reply is missing core markers", index);
                    }
                    let input_tokens = output
                        .input_tokens
                        .unwrap_or_else(|| self.tokenizer.count(&context_text) as u64);
                    let output_tokens = output
                        .output_tokens
                        .unwrap_or_else(|| self.tokenizer.count(&translated_core) as u64);
                    info!("Chunk {} succeeded after {} attempt(s)", index, attempt);

                    return ChunkOutcome::Succeeded {
                        usage: UsageRecord {
                            sequence_index: index,
                            input_tokens,
                            output_tokens,
                            model: self.options.model.clone(),
                        },
                        chunk: TranslatedChunk {
                            sequence_index: index,
                            translated_core,
                            input_tokens,
                            output_tokens,
                            source_spans: chunk.core_spans,
                            markers_found,
                            byte_range: chunk.byte_range,
                        },
                    };
                }
                (ChunkState::Retrying { delay, .. }, Err(source)) => {
                    let err = TranslationError::Transient {
                        sequence_index: index,
                        attempt,
                        source,
                    };
                    warn!("{}; retrying in {:?}", err, delay);
                }
                (_, result) => {
                    let source = result
                        .err()
                        .unwrap_or_else(|| ProviderError::RequestFailed("inconsistent chunk state".to_string()));
                    let err = TranslationError::Fatal {
                        sequence_index: index,
                        attempts: attempt,
                        source,
                    };
                    error!("{}", err);
                    return ChunkOutcome::Failed(ChunkFailure {
                        sequence_index: index,
                        byte_range: chunk.byte_range,
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Extra completion tokens for the markers around the reply
const REPLY_MARGIN_TOKENS: usize = 64;

/// Completion cap for a chunk: its core with room to grow by half, plus the markers
pub fn reply_budget(chunk: &Chunk) -> u32 {
    let tokens = chunk
        .token_length
        .saturating_add(chunk.token_length / 2)
        .saturating_add(REPLY_MARGIN_TOKENS);
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Translated core of a reply, and whether it kept the markers
///
/// A blank core is only accepted for chunks without prose.
fn accept_reply(chunk: &Chunk, reply: &str) -> Result<(String, bool), ProviderError> {
    let (core, markers_found) = extract_core(reply)?;
    let has_prose = chunk
        .core_spans
        .iter()
        .any(|span| !span.is_protected() && !span.text.trim().is_empty());
    if has_prose && core.trim().is_empty() {
        return Err(ProviderError::IncompleteResponse(
            "reply is empty but the chunk has prose to translate".to_string(),
        ));
    }
    Ok((core, markers_found))
}
