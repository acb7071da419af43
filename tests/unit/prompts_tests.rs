/*!
 * Tests for the prompt layout seen by the model
 */

use std::sync::Arc;

use texlate::chunking::{Chunk, ChunkBuilder, ChunkingConfig};
use texlate::errors::ProviderError;
use texlate::markup::MarkupClassifier;
use texlate::tokenizer::WordTokenizer;
use texlate::translation::prompts::{
    CONTEXT_AFTER, CONTEXT_BEFORE, CORE_END, CORE_START, PromptBuilder, extract_core, marked_core,
};

use crate::common;

fn chunks(text: &str, max: usize, overlap: usize) -> Vec<Chunk> {
    let document = MarkupClassifier::default().classify(text).document;
    ChunkBuilder::new(
        Arc::new(WordTokenizer::new()),
        ChunkingConfig {
            max_chunk_tokens: max,
            overlap_tokens: overlap,
            prefer_paragraph_breaks: false,
        },
    )
    .build(&document)
    .unwrap()
}

/// Test that the middle chunk carries both context sections in order
#[test]
fn test_build_withMiddleChunk_shouldOrderContextAroundCore() {
    let chunks = chunks(&common::distinct_words(70), 30, 5);
    assert_eq!(chunks.len(), 3);
    let prompt = PromptBuilder::new("French").without_sample().build(&chunks[1]);

    let before = prompt.find(CONTEXT_BEFORE).unwrap();
    let core = prompt.rfind(CORE_START).unwrap();
    let after = prompt.find(CONTEXT_AFTER).unwrap();
    assert!(before < core && core < after);
    assert!(prompt.contains("into French"));
    assert!(!prompt.contains("Sample Translation Example"));
    assert_eq!(marked_core(&prompt), Some(chunks[1].core_text().as_str()));
}

/// Test that replies with and without markers are both understood
#[test]
fn test_extract_core_withVariousReplies_shouldReturnAuthoritativeText() {
    let reply = format!("Sure!\n{CORE_START}\nBonjour le monde.\n{CORE_END}\nAnything else?");
    assert_eq!(extract_core(&reply).unwrap(), ("Bonjour le monde.".to_string(), true));

    assert_eq!(
        extract_core("\"\"\"Bonjour le monde.\"\"\"\n").unwrap(),
        ("Bonjour le monde.".to_string(), false)
    );
}

/// Test that a reply cut off inside the core is an error, not a translation
#[test]
fn test_extract_core_withUnterminatedCore_shouldReturnIncompleteResponse() {
    let unterminated = format!("{CORE_START}\nBonjour");
    let err = extract_core(&unterminated).unwrap_err();
    assert!(matches!(err, ProviderError::IncompleteResponse(_)));
    assert!(err.is_transient());
}
