/*!
 * Common test utilities for the texlate test suite
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use texlate::chunking::ChunkingConfig;
use texlate::markup::MarkupClassifier;
use texlate::providers::mock::MockProvider;
use texlate::tokenizer::WordTokenizer;
use texlate::translation::cost::CostAccountant;
use texlate::translation::dispatcher::RetryPolicy;
use texlate::translation::pipeline::{PipelineConfig, TranslationPipeline};

/// Route library logs through env_logger once per test binary
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    std::fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Letter-only words that are one token each and never repeat: "wa wb ... wz wab ..."
pub fn distinct_words(n: usize) -> String {
    words_from(0, n)
}

/// `n` distinct words starting at index `first`
pub fn words_from(first: usize, n: usize) -> String {
    (first..first + n)
        .map(|mut i| {
            let mut word = String::from("w");
            loop {
                word.push((b'a' + (i % 26) as u8) as char);
                i /= 26;
                if i == 0 {
                    break word;
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pipeline config with immediate retries and small chunks
pub fn pipeline_config(max: usize, overlap: usize) -> PipelineConfig {
    PipelineConfig {
        chunking: ChunkingConfig {
            max_chunk_tokens: max,
            overlap_tokens: overlap,
            prefer_paragraph_breaks: true,
        },
        retry: RetryPolicy::immediate(2),
        max_concurrent_requests: 3,
        min_seam_match: 2,
        include_sample: true,
    }
}

/// Pipeline over the word tokenizer and the given mock
pub fn mock_pipeline(provider: &MockProvider, config: PipelineConfig) -> TranslationPipeline {
    TranslationPipeline::new(
        MarkupClassifier::default(),
        Arc::new(WordTokenizer::new()),
        Arc::new(provider.clone()),
        CostAccountant::default(),
        config,
    )
}
