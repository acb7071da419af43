/*!
 * Chunk translation and document reassembly.
 *
 * - `prompts`: per-chunk context text and reply extraction
 * - `dispatcher`: concurrent dispatch with per-chunk retry
 * - `reassembly`: ordered merge, seam de-duplication and markup repair
 * - `cost`: usage records and price aggregation
 * - `pipeline`: the end-to-end flow over one document
 */

pub use self::cost::{CostAccountant, CostReport, ModelPrice, PriceTable, UsageRecord};
pub use self::dispatcher::{ChunkOutcome, ChunkState, Dispatcher, RetryPolicy, TranslatedChunk};
pub use self::pipeline::{PipelineConfig, PipelineOutput, TranslationPipeline};
pub use self::reassembly::{FidelityWarning, Reassembler, SeamWarning};

pub mod cost;
pub mod dispatcher;
pub mod pipeline;
pub mod prompts;
pub mod reassembly;
