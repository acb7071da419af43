/*!
 * # texlate - token-bounded LaTeX translation
 *
 * A Rust library for translating LaTeX documents with a chat model while
 * leaving commands, environments, math and comments untouched.
 *
 * ## Features
 *
 * - Markup classification into PROTECTED and TRANSLATABLE spans
 * - Token-bounded chunking with context overlap on both sides
 * - Concurrent dispatch with retries, backoff and a concurrency cap
 * - Order-preserving reassembly with seam de-duplication and
 *   protected-span verification
 * - Per-model cost accounting
 * - Partial-failure salvage
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `tokenizer`: Token counting (`tiktoken-rs` GPT-2 BPE or word pieces)
 * - `markup`: LaTeX markup classification
 * - `chunking`: Chunk construction
 * - `translation`: Dispatch, reassembly and accounting:
 *   - `translation::prompts`: Prompt layout and core markers
 *   - `translation::dispatcher`: Concurrent dispatch and retry state machine
 *   - `translation::reassembly`: Ordered reassembly
 *   - `translation::cost`: Token usage pricing
 *   - `translation::pipeline`: End-to-end orchestration
 * - `providers`: Translation capability and its OpenAI and mock clients
 * - `request`: Request payload validation
 * - `source`: Document fetching and page truncation
 * - `storage`: Output sink
 * - `app_controller`: Request handling
 * - `language_utils`: Target languages
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod chunking;
pub mod errors;
pub mod language_utils;
pub mod markup;
pub mod providers;
pub mod request;
pub mod source;
pub mod storage;
pub mod tokenizer;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, ErrorResponse, TranslateResponse};
pub use chunking::{Chunk, ChunkBuilder, ChunkingConfig};
pub use errors::{AppError, PipelineError, ProviderError, TranslationError};
pub use markup::{Document, MarkupClassifier, Span, SpanKind};
pub use request::{TranslateRequest, TranslationModel};
pub use tokenizer::{BpeTokenizer, Tokenizer, WordTokenizer};
pub use translation::TranslationPipeline;
