/*!
 * Prompt construction and response extraction for chunk translation.
 *
 * Each chunk is sent as one context text: the instruction, a worked sample,
 * the read-only neighbour context and the core wrapped in markers. The reply
 * is expected to repeat the core markers around the translation.
 */

use crate::chunking::Chunk;
use crate::errors::ProviderError;

/// Marks the start of the text to translate
pub const CORE_START: &str = "<<TRANSLATE>>";
/// Marks the end of the text to translate
pub const CORE_END: &str = "<<END_TRANSLATE>>";
/// Opens the read-only preceding context
pub const CONTEXT_BEFORE: &str = "<<CONTEXT_BEFORE>>";
/// Opens the read-only following context
pub const CONTEXT_AFTER: &str = "<<CONTEXT_AFTER>>";
/// Closes a context section
pub const CONTEXT_END: &str = "<<END_CONTEXT>>";

/// Default system prompt; `{target_language}` is substituted by the provider.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator of LaTeX documents into {target_language}. \
Translate prose only. Commands, environments, math, labels, references and comments must be copied unchanged.";

const SAMPLE_INPUT: &str = r"\section{Introducción a la Álgebra} \label{introAlg}";
const SAMPLE_OUTPUT: &str = r"\section{Introduction to Algebra} \label{introAlg}";

/// Builds the per-chunk context text
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_language: String,
    include_sample: bool,
}

impl PromptBuilder {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            include_sample: true,
        }
    }

    pub fn without_sample(mut self) -> Self {
        self.include_sample = false;
        self
    }

    /// Render the context text for a chunk
    pub fn build(&self, chunk: &Chunk) -> String {
        let mut prompt = format!(
            "Translate the following LaTeX document into {}, translating only the plain text and leaving LaTeX commands unchanged.\n\
             Only the text between {CORE_START} and {CORE_END} must be translated. \
             The context sections are for reference and must not appear in the reply. \
             Reply with the translation wrapped in {CORE_START} and {CORE_END}.\n\n",
            self.target_language
        );

        if self.include_sample {
            prompt.push_str("Sample Translation Example:\nInput:\n");
            prompt.push_str(SAMPLE_INPUT);
            prompt.push_str("\nOutput:\n");
            prompt.push_str(SAMPLE_OUTPUT);
            prompt.push_str("\n\n");
        }

        if !chunk.leading_overlap.is_empty() {
            push_section(&mut prompt, CONTEXT_BEFORE, &chunk.leading_overlap.text, CONTEXT_END);
        }
        push_section(&mut prompt, CORE_START, &chunk.core_text(), CORE_END);
        if !chunk.trailing_overlap.is_empty() {
            push_section(&mut prompt, CONTEXT_AFTER, &chunk.trailing_overlap.text, CONTEXT_END);
        }

        prompt
    }
}

fn push_section(prompt: &mut String, open: &str, body: &str, close: &str) {
    prompt.push_str(open);
    prompt.push('\n');
    prompt.push_str(body);
    prompt.push('\n');
    prompt.push_str(close);
    prompt.push('\n');
}

/// Text found between the last core start marker of `text` and the end marker after it
pub fn marked_core(text: &str) -> Option<&str> {
    let start = text.rfind(CORE_START)? + CORE_START.len();
    let end = start + text[start..].find(CORE_END)?;
    let body = &text[start..end];
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some(body.strip_suffix('\n').unwrap_or(body))
}

/// Translated core of a model reply, and whether the markers were found
///
/// Without markers the whole reply is returned, minus surrounding
/// triple quotes, and the caller has to deduplicate overlap echoes.
/// A reply that opens the core but never closes it was cut short.
pub fn extract_core(response: &str) -> Result<(String, bool), ProviderError> {
    if let Some(core) = marked_core(response) {
        return Ok((core.to_string(), true));
    }
    if response.contains(CORE_START) {
        return Err(ProviderError::IncompleteResponse(format!(
            "reply opens {CORE_START} but has no {CORE_END}"
        )));
    }
    Ok((response.replace("\"\"\"", "").trim().to_string(), false))
}
