/*!
 * Tokenizer adapters.
 *
 * A tokenizer turns text into an ordered, contiguous sequence of token spans
 * with byte offsets. A span normally weighs one token; a span that cannot be
 * cut further without splitting a character carries the surplus. The chunk
 * builder measures every length in these weights, so `count(text)` always
 * equals the summed weight of `tokenize(text)`.
 *
 * - `WordTokenizer`: one unit per GPT-2 pre-token piece
 * - `BpeTokenizer`: GPT-2 (`r50k_base`) byte-pair encoding via tiktoken-rs
 */

use std::fmt::Debug;
use std::ops::Range;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use tiktoken_rs::CoreBPE;

/// GPT-2 pre-tokenizer split, without the lookahead the regex crate lacks
static PRETOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+")
        .expect("Invalid pre-token regex")
});

/// A byte range into the tokenized text and the number of tokens it stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
    /// Always at least 1
    pub weight: usize,
}

impl TokenSpan {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Capability that defines "length" for chunking decisions
pub trait Tokenizer: Send + Sync + Debug {
    /// Split text into contiguous token units covering the whole input
    fn tokenize(&self, text: &str) -> Vec<TokenSpan>;

    /// Number of tokens in the text
    fn count(&self, text: &str) -> usize {
        self.tokenize(text).iter().map(|span| span.weight).sum()
    }

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Split text into pre-token pieces, filling any gap the regex leaves
fn pretokenize(text: &str) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut cursor = 0;
    for m in PRETOKEN_REGEX.find_iter(text) {
        if m.start() > cursor {
            pieces.push(cursor..m.start());
        }
        pieces.push(m.start()..m.end());
        cursor = m.end();
    }
    if cursor < text.len() {
        pieces.push(cursor..text.len());
    }
    pieces
}

/// Tokenizer with one unit per pre-token piece (word, number, punctuation run, whitespace run)
#[derive(Debug, Default, Clone)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<TokenSpan> {
        pretokenize(text)
            .into_iter()
            .map(|r| TokenSpan {
                start: r.start,
                end: r.end,
                weight: 1,
            })
            .collect()
    }

    fn name(&self) -> &str {
        "word"
    }
}

/// GPT-2 byte-pair tokenizer.
///
/// Each pre-token piece weighs as many tokens as its BPE encoding has. BPE
/// tokens may cut through a UTF-8 sequence, so span boundaries are spread
/// evenly over the piece's char boundaries instead of following token bytes.
/// A piece with more tokens than chars puts the surplus on its last span.
pub struct BpeTokenizer {
    bpe: CoreBPE,
}

impl Debug for BpeTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BpeTokenizer").field("encoding", &"r50k_base").finish()
    }
}

impl BpeTokenizer {
    /// Load the GPT-2 encoding bundled with tiktoken-rs
    pub fn gpt2() -> Result<Self> {
        let bpe = tiktoken_rs::r50k_base()
            .map_err(|e| anyhow!("Failed to load r50k_base encoding: {}", e))?;
        Ok(Self { bpe })
    }
}

fn split_evenly(base: usize, piece: &str, units: usize, out: &mut Vec<TokenSpan>) {
    let boundaries: Vec<usize> = piece.char_indices().map(|(i, _)| i).collect();
    let chars = boundaries.len();
    if chars == 0 {
        return;
    }
    let units = units.max(1);
    let spans = units.min(chars);
    for k in 0..spans {
        let from = boundaries[k * chars / spans];
        let (to, weight) = if k + 1 == spans {
            (piece.len(), units - spans + 1)
        } else {
            (boundaries[(k + 1) * chars / spans], 1)
        };
        out.push(TokenSpan {
            start: base + from,
            end: base + to,
            weight,
        });
    }
}

impl Tokenizer for BpeTokenizer {
    fn tokenize(&self, text: &str) -> Vec<TokenSpan> {
        let mut spans = Vec::new();
        for range in pretokenize(text) {
            let piece = &text[range.clone()];
            let units = self.bpe.encode_ordinary(piece).len();
            split_evenly(range.start, piece, units, &mut spans);
        }
        spans
    }

    fn name(&self) -> &str {
        "gpt2-bpe"
    }
}
