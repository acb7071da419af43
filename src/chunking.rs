/*!
 * Chunk building.
 *
 * Splits a classified document into ordered, token-bounded chunks. Each chunk
 * has a core (the content it is responsible for) and leading/trailing overlap
 * regions copied from the neighbouring cores so the model sees context across
 * the boundary.
 *
 * The builder works on atoms: every token span of a TRANSLATABLE span is one
 * atom, every PROTECTED span is a single atom weighted by its token count.
 * Chunks only ever close between atoms, so protected spans are never split.
 *
 * The limit covers what is sent to the model: core plus both overlaps.
 */

use std::ops::Range;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ChunkOverflowError;
use crate::markup::{Document, Span, SpanKind};
use crate::tokenizer::Tokenizer;

/// Chunk size settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum token length of a chunk, core and overlaps together
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,

    /// Token budget of each overlap region
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Close chunks after a paragraph break when one falls in the second half
    #[serde(default = "default_true")]
    pub prefer_paragraph_breaks: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: default_max_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
            prefer_paragraph_breaks: true,
        }
    }
}

fn default_max_chunk_tokens() -> usize {
    1000
}

fn default_overlap_tokens() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Context copied from a neighbouring chunk core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub text: String,
    pub token_count: usize,
    pub byte_range: Range<usize>,
}

impl Overlap {
    fn empty(at: usize) -> Self {
        Self {
            text: String::new(),
            token_count: 0,
            byte_range: at..at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }
}

/// A bounded unit of content submitted in one translation call
#[derive(Debug, Clone)]
pub struct Chunk {
    pub sequence_index: usize,
    /// TRANSLATABLE spans clipped to this chunk, with PROTECTED spans interleaved
    pub core_spans: Vec<Span>,
    pub leading_overlap: Overlap,
    pub trailing_overlap: Overlap,
    /// Token length of the core
    pub token_length: usize,
    pub byte_range: Range<usize>,
}

impl Chunk {
    pub fn core_text(&self) -> String {
        self.core_spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Token length of core and both overlaps, as sent to the model
    pub fn context_token_length(&self) -> usize {
        self.leading_overlap.token_count + self.token_length + self.trailing_overlap.token_count
    }

    pub fn protected_spans(&self) -> impl Iterator<Item = &Span> {
        self.core_spans.iter().filter(|s| s.is_protected())
    }
}

#[derive(Debug, Clone, Copy)]
struct Atom {
    start: usize,
    end: usize,
    tokens: usize,
    kind: SpanKind,
    paragraph_break: bool,
}

/// Builds chunks from classified spans
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkingConfig,
}

impl ChunkBuilder {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ChunkingConfig) -> Self {
        Self { tokenizer, config }
    }

    /// Split the document into chunks whose context never exceeds `max_chunk_tokens`
    pub fn build(&self, document: &Document) -> Result<Vec<Chunk>, ChunkOverflowError> {
        let source = document.reconstruct();
        let atoms = self.atomize(document)?;
        if atoms.is_empty() {
            return Ok(Vec::new());
        }

        let mut prefix = Vec::with_capacity(atoms.len() + 1);
        prefix.push(0usize);
        for atom in &atoms {
            prefix.push(prefix.last().copied().unwrap_or(0) + atom.tokens);
        }

        let cores = self.partition(&atoms, &prefix);

        let mut chunks: Vec<Chunk> = cores
            .iter()
            .enumerate()
            .map(|(sequence_index, core)| {
                let byte_range = atoms[core.start].start..atoms[core.end - 1].end;
                Chunk {
                    sequence_index,
                    core_spans: clip_spans(document.spans(), &byte_range),
                    leading_overlap: Overlap::empty(byte_range.start),
                    trailing_overlap: Overlap::empty(byte_range.end),
                    token_length: prefix[core.end] - prefix[core.start],
                    byte_range,
                }
            })
            .collect();

        // Second pass: stitch overlaps from the neighbouring cores into the room left
        for i in 0..chunks.len() {
            let has_previous = i > 0;
            let has_next = i + 1 < cores.len();
            let sides = usize::from(has_previous) + usize::from(has_next);
            if sides == 0 {
                continue;
            }
            let room = self.config.max_chunk_tokens.saturating_sub(chunks[i].token_length);
            let budget = self.config.overlap_tokens.min(room / sides);
            if has_previous {
                chunks[i].leading_overlap = suffix_overlap(&source, &atoms[cores[i - 1].clone()], budget);
            }
            if has_next {
                chunks[i].trailing_overlap = prefix_overlap(&source, &atoms[cores[i + 1].clone()], budget);
            }
        }

        debug!(
            "Built {} chunk(s) from {} atom(s) ({} tokens, max {} per chunk)",
            chunks.len(),
            atoms.len(),
            prefix[atoms.len()],
            self.config.max_chunk_tokens
        );

        Ok(chunks)
    }

    fn atomize(&self, document: &Document) -> Result<Vec<Atom>, ChunkOverflowError> {
        let max = self.config.max_chunk_tokens;
        let mut atoms = Vec::new();

        for span in document.spans() {
            match span.kind {
                SpanKind::Protected => {
                    let tokens = self.tokenizer.count(&span.text).max(1);
                    if tokens > max {
                        return Err(ChunkOverflowError {
                            start: span.start,
                            end: span.end,
                            tokens,
                            max,
                        });
                    }
                    atoms.push(Atom {
                        start: span.start,
                        end: span.end,
                        tokens,
                        kind: SpanKind::Protected,
                        paragraph_break: false,
                    });
                }
                SpanKind::Translatable => {
                    for token in self.tokenizer.tokenize(&span.text) {
                        atoms.push(Atom {
                            start: span.start + token.start,
                            end: span.start + token.end,
                            tokens: token.weight,
                            kind: SpanKind::Translatable,
                            paragraph_break: token.text(&span.text).contains("\n\n"),
                        });
                    }
                }
            }
        }

        Ok(atoms)
    }

    /// Greedy partition of atoms into core ranges
    ///
    /// A core leaves room for a full overlap on every side that has a neighbour.
    fn partition(&self, atoms: &[Atom], prefix: &[usize]) -> Vec<Range<usize>> {
        let max = self.config.max_chunk_tokens;
        let overlap = self.config.overlap_tokens;
        let total = prefix[atoms.len()];
        let mut cores = Vec::new();
        let mut start = 0;

        while start < atoms.len() {
            let leading = if start > 0 { overlap } else { 0 };
            if total - prefix[start] + leading <= max {
                cores.push(start..atoms.len());
                break;
            }

            let limit = max.saturating_sub(leading + overlap).max(1);
            let mut end = start + 1;
            while end < atoms.len() && prefix[end + 1] - prefix[start] <= limit {
                end += 1;
            }

            if self.config.prefer_paragraph_breaks {
                if let Some(j) = (start..end)
                    .rev()
                    .find(|&j| atoms[j].paragraph_break && prefix[j + 1] - prefix[start] >= limit / 2)
                {
                    end = j + 1;
                }
            }

            cores.push(start..end);
            start = end;
        }
        cores
    }
}

/// Spans intersecting `range`, clipped to it
fn clip_spans(spans: &[Span], range: &Range<usize>) -> Vec<Span> {
    spans
        .iter()
        .filter(|s| s.end > range.start && s.start < range.end)
        .map(|s| {
            let from = s.start.max(range.start);
            let to = s.end.min(range.end);
            Span::new(s.kind, &s.text[from - s.start..to - s.start], from)
        })
        .collect()
}

/// Longest contiguous tail of a core that fits the overlap budget
fn suffix_overlap(source: &str, core: &[Atom], budget: usize) -> Overlap {
    let end = core.last().map(|a| a.end).unwrap_or(0);
    let mut start = end;
    let mut tokens = 0;
    for atom in core.iter().rev() {
        if tokens + atom.tokens > budget {
            break;
        }
        tokens += atom.tokens;
        start = atom.start;
    }
    Overlap {
        text: source[start..end].to_string(),
        token_count: tokens,
        byte_range: start..end,
    }
}

/// Longest contiguous head of a core that fits the overlap budget
fn prefix_overlap(source: &str, core: &[Atom], budget: usize) -> Overlap {
    let start = core.first().map(|a| a.start).unwrap_or(0);
    let mut end = start;
    let mut tokens = 0;
    for atom in core {
        if tokens + atom.tokens > budget {
            break;
        }
        tokens += atom.tokens;
        end = atom.end;
    }
    Overlap {
        text: source[start..end].to_string(),
        token_count: tokens,
        byte_range: start..end,
    }
}
