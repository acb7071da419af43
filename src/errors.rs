/*!
 * Error types for the texlate pipeline.
 *
 * Fatal conditions are modelled with thiserror enums and structs so that the
 * request boundary can report the sequence index and byte range of the chunk
 * that failed. Non-fatal conditions (classification, fidelity and seam
 * warnings) live next to the component that raises them and are only logged.
 */

use std::ops::Range;

use thiserror::Error;

use crate::translation::cost::UsageRecord;

/// Errors that can occur when calling a translation provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The provider throttled the request
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Message from the API
        message: String,
        /// Delay suggested by the provider, if any
        retry_after_secs: Option<u64>,
    },

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The model rejected or could not complete the request
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The reply was cut short or came back without the translated text
    #[error("Incomplete response: {0}")]
    IncompleteResponse(String),
}

impl ProviderError {
    /// Whether the failure may go away on its own and is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Timeout(_)
            | Self::ConnectionError(_)
            | Self::IncompleteResponse(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Provider-suggested wait before the next attempt
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        }
    }
}

/// A single PROTECTED span is larger than the chunk budget and cannot be split
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Protected span at bytes {start}..{end} is {tokens} tokens long, exceeding the chunk limit of {max}")]
pub struct ChunkOverflowError {
    /// Start byte offset of the offending span
    pub start: usize,
    /// End byte offset of the offending span
    pub end: usize,
    /// Token length of the span
    pub tokens: usize,
    /// Configured maximum chunk length
    pub max: usize,
}

/// Errors raised while translating one chunk
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Attempt failed with a retryable error
    #[error("Chunk {sequence_index} attempt {attempt} failed transiently: {source}")]
    Transient {
        sequence_index: usize,
        attempt: u32,
        #[source]
        source: ProviderError,
    },

    /// The chunk is FAILED and will not be retried again
    #[error("Chunk {sequence_index} failed after {attempts} attempt(s): {source}")]
    Fatal {
        sequence_index: usize,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

/// Description of one chunk that ended FAILED
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub sequence_index: usize,
    pub byte_range: Range<usize>,
    pub attempts: u32,
    pub message: String,
}

/// At least one chunk failed; completed work is kept for salvage
#[derive(Error, Debug, Clone)]
#[error("{} of {} chunk(s) failed to translate (failed indices: {:?})", .failed.len(), .failed.len() + .succeeded.len(), .failed.iter().map(|f| f.sequence_index).collect::<Vec<_>>())]
pub struct PartialTranslationError {
    /// Sequence indices that translated successfully
    pub succeeded: Vec<usize>,
    /// Chunks that exhausted their retries or hit a fatal error
    pub failed: Vec<ChunkFailure>,
    /// Document with translated chunks and the source text of failed ones
    pub partial_document: String,
    /// Usage of the chunks that completed
    pub usage: Vec<UsageRecord>,
}

impl PartialTranslationError {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.sequence_index).collect()
    }
}

/// Reassembler received a non-contiguous set of chunks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Reassembly gap: expected {expected} chunk(s), missing sequence indices {missing:?}")]
pub struct ReassemblyGapError {
    pub expected: usize,
    pub missing: Vec<usize>,
}

/// Errors that end a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ChunkOverflow(#[from] ChunkOverflowError),

    #[error(transparent)]
    PartialTranslation(#[from] PartialTranslationError),

    #[error(transparent)]
    ReassemblyGap(#[from] ReassemblyGapError),
}

/// Errors from the storage sink
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write object {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage location: {0}")]
    InvalidLocation(String),
}

/// A request rejected at the boundary before any chunking happens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid request parameters: {field} {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Failed to download the file from the provided URL: {0}")]
    Fetch(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Some chunks failed; the salvaged document was stored anyway
    #[error("{source} (partial document: {partial_file_url})")]
    PartialResult {
        #[source]
        source: PartialTranslationError,
        partial_file_url: String,
    },

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
