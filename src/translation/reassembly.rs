/*!
 * Ordered reassembly of translated chunks.
 *
 * Chunks arrive in completion order. The reassembler buffers them by
 * sequence index and merges each one as soon as its predecessor is merged.
 * Merging removes context the model echoed back at the seam and restores
 * any protected construct the model altered or dropped.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::ReassemblyGapError;
use crate::markup::Span;
use crate::tokenizer::Tokenizer;
use crate::translation::dispatcher::TranslatedChunk;

/// Seam handling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReassemblyConfig {
    /// Overlap budget the chunks were built with; the seam search covers twice this
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Shortest echoed run, in tokens, that counts as a duplicate
    #[serde(default = "default_min_seam_match")]
    pub min_seam_match: usize,
}

fn default_overlap_tokens() -> usize {
    100
}

fn default_min_seam_match() -> usize {
    3
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            overlap_tokens: default_overlap_tokens(),
            min_seam_match: default_min_seam_match(),
        }
    }
}

/// How a protected construct was repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FidelityRepair {
    /// Found with altered whitespace and restored from the source
    Restored,
    /// Missing from the translation and inserted at the predicted position
    Inserted,
}

/// A protected construct that did not survive translation unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FidelityWarning {
    pub sequence_index: usize,
    /// Byte offset of the construct in the source document
    pub span_offset: usize,
    pub expected: String,
    pub repair: FidelityRepair,
}

/// An unmarked reply whose head could not be matched against the previous tail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeamWarning {
    pub sequence_index: usize,
    pub message: String,
}

/// Result of a completed reassembly
#[derive(Debug, Clone, PartialEq)]
pub struct ReassembledDocument {
    pub text: String,
    pub fidelity_warnings: Vec<FidelityWarning>,
    pub seam_warnings: Vec<SeamWarning>,
}

#[derive(Debug)]
enum Pending {
    Translated(TranslatedChunk),
    /// Untranslated source core standing in for a failed chunk
    Source(String),
}

/// Ordered buffer that turns out-of-order chunks into one document
#[derive(Debug)]
pub struct Reassembler {
    tokenizer: Arc<dyn Tokenizer>,
    config: ReassemblyConfig,
    expected: usize,
    next: usize,
    pending: BTreeMap<usize, Pending>,
    output: String,
    previous_was_translated: bool,
    fidelity_warnings: Vec<FidelityWarning>,
    seam_warnings: Vec<SeamWarning>,
}

impl Reassembler {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ReassemblyConfig, expected: usize) -> Self {
        Self {
            tokenizer,
            config,
            expected,
            next: 0,
            pending: BTreeMap::new(),
            output: String::new(),
            previous_was_translated: false,
            fidelity_warnings: Vec::new(),
            seam_warnings: Vec::new(),
        }
    }

    /// Number of chunks merged so far
    pub fn merged(&self) -> usize {
        self.next
    }

    /// Buffer a translated chunk and merge everything that became contiguous
    pub fn accept(&mut self, chunk: TranslatedChunk) {
        let index = chunk.sequence_index;
        self.enqueue(index, Pending::Translated(chunk));
    }

    /// Use the untranslated source core for a chunk that failed
    pub fn accept_source(&mut self, sequence_index: usize, source_core: impl Into<String>) {
        self.enqueue(sequence_index, Pending::Source(source_core.into()));
    }

    fn enqueue(&mut self, index: usize, entry: Pending) {
        if index >= self.expected || index < self.next || self.pending.contains_key(&index) {
            warn!("Ignoring unexpected or duplicate chunk {}", index);
            return;
        }
        self.pending.insert(index, entry);

        while let Some(entry) = self.pending.remove(&self.next) {
            match entry {
                Pending::Translated(chunk) => self.merge(chunk),
                Pending::Source(text) => {
                    self.output.push_str(&text);
                    self.previous_was_translated = false;
                }
            }
            self.next += 1;
        }
    }

    /// Return the document, failing if any sequence index never arrived
    pub fn finish(self) -> Result<ReassembledDocument, ReassemblyGapError> {
        if self.next < self.expected {
            let missing = (self.next..self.expected)
                .filter(|i| !self.pending.contains_key(i))
                .collect();
            return Err(ReassemblyGapError {
                expected: self.expected,
                missing,
            });
        }

        Ok(ReassembledDocument {
            text: self.output,
            fidelity_warnings: self.fidelity_warnings,
            seam_warnings: self.seam_warnings,
        })
    }

    fn merge(&mut self, chunk: TranslatedChunk) {
        let source_core = chunk.source_core();
        let mut text = restore_boundary_whitespace(&source_core, &chunk.translated_core);

        if !chunk.markers_found && chunk.sequence_index > 0 && self.previous_was_translated {
            text = self.strip_echoed_head(chunk.sequence_index, text);
        }

        let text = self.verify_protected(chunk.sequence_index, text, &chunk.source_spans);
        debug!("Merged chunk {} ({} bytes)", chunk.sequence_index, text.len());

        self.output.push_str(&text);
        self.previous_was_translated = true;
    }

    /// Remove the longest head of `text` that repeats the merged tail
    fn strip_echoed_head(&mut self, sequence_index: usize, text: String) -> String {
        let window = self.config.overlap_tokens * 2;
        if window == 0 {
            return text;
        }

        let tail_tokens = normalized_tokens(self.tokenizer.as_ref(), &self.output);
        let tail: Vec<&str> = tail_tokens
            .iter()
            .rev()
            .take(window)
            .rev()
            .map(|(t, _)| t.as_str())
            .collect();
        let head_tokens: Vec<(String, usize)> = normalized_tokens(self.tokenizer.as_ref(), &text)
            .into_iter()
            .take(window)
            .collect();

        let longest = tail.len().min(head_tokens.len());
        let matched = (self.config.min_seam_match.max(1)..=longest).rev().find(|&k| {
            tail[tail.len() - k..]
                .iter()
                .zip(&head_tokens[..k])
                .all(|(a, (b, _))| *a == b.as_str())
        });

        match matched {
            Some(k) => {
                let cut = head_tokens[k - 1].1;
                debug!("Chunk {}: removed {} echoed token(s) at seam", sequence_index, k);
                text[cut..].to_string()
            }
            None => {
                let message = "reply lacks core markers and no echoed context was found at the seam".to_string();
                warn!("Chunk {}: {}", sequence_index, message);
                self.seam_warnings.push(SeamWarning {
                    sequence_index,
                    message,
                });
                text
            }
        }
    }

    /// Make every protected source span appear verbatim, in order
    fn verify_protected(&mut self, sequence_index: usize, mut text: String, source_spans: &[Span]) -> String {
        let Some(first) = source_spans.first() else {
            return text;
        };
        let base = first.start;
        let source_len = source_spans.last().map(|s| s.end - base).unwrap_or(0);

        let mut cursor = 0;
        let mut source_cursor = 0;
        for span in source_spans.iter().filter(|s| s.is_protected()) {
            let relative_start = span.start - base;

            if let Some(pos) = text[cursor..].find(&span.text) {
                cursor += pos + span.text.len();
            } else if let Some(range) = find_whitespace_insensitive(&text[cursor..], &span.text) {
                let start = cursor + range.start;
                text.replace_range(start..cursor + range.end, &span.text);
                cursor = start + span.text.len();
                self.record_repair(sequence_index, span, FidelityRepair::Restored);
            } else {
                let remaining_source = source_len.saturating_sub(source_cursor).max(1);
                let remaining_text = text.len() - cursor;
                let predicted = cursor
                    + (relative_start.saturating_sub(source_cursor) * remaining_text) / remaining_source;
                let pos = snap_to_whitespace(&text, cursor, predicted.min(text.len()));

                let mut insertion = span.text.clone();
                if text[pos..].chars().next().is_some_and(|c| !c.is_whitespace()) {
                    insertion.push(' ');
                }
                text.insert_str(pos, &insertion);
                cursor = pos + span.text.len();
                self.record_repair(sequence_index, span, FidelityRepair::Inserted);
            }

            source_cursor = span.end - base;
        }

        text
    }

    fn record_repair(&mut self, sequence_index: usize, span: &Span, repair: FidelityRepair) {
        warn!(
            "Chunk {}: protected text at byte {} was {} ({:?})",
            sequence_index,
            span.start,
            match repair {
                FidelityRepair::Restored => "altered and has been restored",
                FidelityRepair::Inserted => "missing and has been reinserted",
            },
            span.text
        );
        self.fidelity_warnings.push(FidelityWarning {
            sequence_index,
            span_offset: span.start,
            expected: span.text.clone(),
            repair,
        });
    }
}

/// Case-folded, trimmed tokens with the byte offset where each one ends
fn normalized_tokens(tokenizer: &dyn Tokenizer, text: &str) -> Vec<(String, usize)> {
    tokenizer
        .tokenize(text)
        .into_iter()
        .filter_map(|t| {
            let normalized = t.text(text).trim().to_lowercase();
            (!normalized.is_empty()).then_some((normalized, t.end))
        })
        .collect()
}

/// Reapply leading and trailing whitespace of the source core the model dropped
fn restore_boundary_whitespace(source: &str, translated: &str) -> String {
    if translated.trim().is_empty() {
        return translated.to_string();
    }

    let source_leading = &source[..source.len() - source.trim_start().len()];
    let source_trailing = &source[source.trim_end().len()..];
    let mut out = String::with_capacity(translated.len() + source_leading.len() + source_trailing.len());

    if translated.trim_start().len() == translated.len() {
        out.push_str(source_leading);
    }
    out.push_str(translated);
    if translated.trim_end().len() == translated.len() {
        out.push_str(source_trailing);
    }
    out
}

/// Byte range in `haystack` whose non-whitespace characters equal those of `needle`
fn find_whitespace_insensitive(haystack: &str, needle: &str) -> Option<std::ops::Range<usize>> {
    let wanted: Vec<char> = needle.chars().filter(|c| !c.is_whitespace()).collect();
    let first = *wanted.first()?;

    for (start, c) in haystack.char_indices() {
        if c != first {
            continue;
        }
        let mut matched = 0;
        let mut end = start;
        for (offset, ch) in haystack[start..].char_indices() {
            if ch.is_whitespace() {
                continue;
            }
            if ch != wanted[matched] {
                break;
            }
            matched += 1;
            end = start + offset + ch.len_utf8();
            if matched == wanted.len() {
                return Some(start..end);
            }
        }
    }
    None
}

/// Nearest insertion point at or after `floor` that follows whitespace
fn snap_to_whitespace(text: &str, floor: usize, predicted: usize) -> usize {
    let mut candidates: Vec<usize> = text[floor..]
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, c)| floor + i + c.len_utf8())
        .collect();
    candidates.push(floor);
    candidates.push(text.len());

    candidates
        .into_iter()
        .min_by_key(|&p| (p.abs_diff(predicted), std::cmp::Reverse(p)))
        .unwrap_or(text.len())
}
