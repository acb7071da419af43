/*!
 * Tests for chunk construction over a real BPE tokenizer
 */

use std::sync::Arc;

use texlate::chunking::{ChunkBuilder, ChunkingConfig};
use texlate::markup::MarkupClassifier;
use texlate::tokenizer::{BpeTokenizer, Tokenizer};

fn paper(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "\\subsection{{Sección {i}}}\\label{{sec:{i}}}\n\
                 En esta sección analizamos el caso $n = {i}$ con detalle, \
                 siguiendo \\cite{{ref{i}}} y la Figura~\\ref{{fig:{i}}}.\n\
                 \\begin{{equation}}\n  f_{i}(x) = x^{i} + {i}\n\\end{{equation}}\n\
                 Los resultados confirman la hipótesis inicial.\n\n"
            )
        })
        .collect()
}

fn build(text: &str, max: usize, overlap: usize) -> (Arc<dyn Tokenizer>, Vec<texlate::chunking::Chunk>) {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(BpeTokenizer::gpt2().unwrap());
    let document = MarkupClassifier::default().classify(text).document;
    let chunks = ChunkBuilder::new(
        Arc::clone(&tokenizer),
        ChunkingConfig {
            max_chunk_tokens: max,
            overlap_tokens: overlap,
            prefer_paragraph_breaks: true,
        },
    )
    .build(&document)
    .unwrap();
    (tokenizer, chunks)
}

/// Test the length invariant, overlaps included, with GPT-2 token counts
#[test]
fn test_build_withBpeTokenizer_shouldKeepEveryChunkWithinLimit() {
    let text = paper(30);
    let (_, chunks) = build(&text, 200, 20);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.token_length <= 200, "chunk {} has {} tokens", chunk.sequence_index, chunk.token_length);
        assert!(
            chunk.context_token_length() <= 200,
            "chunk {} sends {} tokens",
            chunk.sequence_index,
            chunk.context_token_length()
        );
        assert!(chunk.leading_overlap.token_count <= 20);
        assert!(chunk.trailing_overlap.token_count <= 20);
        assert_eq!(
            chunk.context_token_length(),
            chunk.token_length + chunk.leading_overlap.token_count + chunk.trailing_overlap.token_count
        );
    }
}

/// Test that cores tile the source without loss or duplication
#[test]
fn test_build_withBpeTokenizer_shouldTileSourceExactly() {
    let text = paper(25);
    let (_, chunks) = build(&text, 150, 15);

    let rebuilt: String = chunks.iter().map(|c| c.core_text()).collect();
    assert_eq!(rebuilt, text);

    let mut cursor = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.sequence_index, i);
        assert_eq!(chunk.byte_range.start, cursor);
        cursor = chunk.byte_range.end;
    }
    assert_eq!(cursor, text.len());
}

/// Test that protected spans stay whole across chunk boundaries
#[test]
fn test_build_withEquations_shouldNeverSplitProtectedSpans() {
    let text = paper(20);
    let protected: Vec<String> = MarkupClassifier::default()
        .classify(&text)
        .document
        .protected_spans()
        .map(|s| s.text.clone())
        .collect();
    let (_, chunks) = build(&text, 120, 10);

    for chunk in &chunks {
        for span in chunk.protected_spans() {
            assert!(protected.contains(&span.text), "protected span split: {:?}", span.text);
        }
    }
}

/// Test that non-Latin prose is measured by its real BPE length
#[test]
fn test_build_withGreekProse_shouldCountEveryBpeToken() {
    let text = "Η γρήγορη καφέ αλεπού πηδά πάνω από τον τεμπέλη σκύλο. ".repeat(40);
    let (tokenizer, chunks) = build(&text, 120, 12);

    let total: usize = chunks.iter().map(|c| c.token_length).sum();
    assert_eq!(total, tokenizer.count(&text));
    assert!(total > text.split_whitespace().count() * 2);
    for chunk in &chunks {
        assert!(chunk.context_token_length() <= 120);
    }
}
