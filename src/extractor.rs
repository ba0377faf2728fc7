//! Per-post metadata extraction using LLMs.
//!
//! This module provides the `MetadataExtractor` struct which asks the
//! generation backend for a post's line count, language and up to two tags.
//! Extraction fails hard: a post whose metadata cannot be parsed stops the run
//! instead of silently getting empty metadata.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::{GenerationClient, GenerationError};
use crate::models::{FailurePolicy, MAX_METADATA_TAGS, Metadata};
use crate::repair::strip_code_fence;

/// Prompt template for metadata extraction.
const PROMPT_TEMPLATE: &str = r#"You are given a social media post. You need to extract the number of lines, the language of the post and tags.
1. Return a valid JSON object. No preamble.
2. The JSON object must have exactly three keys: line_count, language and tags.
3. tags is an array of text tags. Extract at most two tags.
4. language should be English.

Here is the actual post on which you need to perform this task:
{post}"#;

/// Errors that abort metadata extraction for a post.
#[derive(Debug, Error)]
pub enum MetadataExtractionError {
    /// The generation backend could not be invoked.
    #[error("Failed to extract metadata: {0}")]
    Invocation(#[from] GenerationError),

    /// The backend answered with something that is not a metadata object.
    #[error("Failed to extract metadata: malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Builder for constructing `MetadataExtractor` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use postenrich::extractor::MetadataExtractorBuilder;
/// use postenrich::llm::OllamaClientBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .build()?;
///
/// let extractor = MetadataExtractorBuilder::new()
///     .client(Arc::new(client))
///     .build();
///
/// let metadata = extractor.extract("Woke up at 5am.\nHit the gym.")?;
/// println!("{} lines, tags: {:?}", metadata.line_count, metadata.tags);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MetadataExtractorBuilder {
    client: Option<Arc<dyn GenerationClient>>,
}

impl MetadataExtractorBuilder {
    /// Creates a new `MetadataExtractorBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generation client used for extraction.
    pub fn client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the `MetadataExtractor`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called before `build()`.
    #[must_use]
    pub fn build(self) -> MetadataExtractor {
        MetadataExtractor {
            client: self.client.expect("client must be set via client() method"),
        }
    }
}

/// Extracts structured metadata from a single post's text.
pub struct MetadataExtractor {
    client: Arc<dyn GenerationClient>,
}

impl MetadataExtractor {
    /// Creates a new `MetadataExtractor` with the specified client.
    #[must_use]
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }

    /// Failure policy of this stage.
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::FailHard
    }

    /// Extracts metadata for one post with a single generation call.
    ///
    /// The response may be wrapped in a markdown code fence; anything else
    /// must be a JSON object with `line_count`, `language` and `tags`. More
    /// than two tags are cut down to the first two.
    ///
    /// # Errors
    ///
    /// Returns `MetadataExtractionError::Invocation` if the backend call fails
    /// and `MetadataExtractionError::MalformedResponse` if the response does
    /// not parse.
    pub fn extract(&self, text: &str) -> Result<Metadata, MetadataExtractionError> {
        let prompt = render_prompt(text);
        let response = self.client.generate(&prompt)?;
        let metadata = parse_metadata(&response)?;
        debug!(
            line_count = metadata.line_count,
            language = %metadata.language,
            tags = ?metadata.tags,
            "extracted post metadata"
        );
        Ok(metadata)
    }
}

fn render_prompt(text: &str) -> String {
    PROMPT_TEMPLATE.replace("{post}", text)
}

/// Parses a metadata response without any repair beyond fence unwrapping.
fn parse_metadata(response: &str) -> Result<Metadata, MetadataExtractionError> {
    let json = strip_code_fence(response);
    let parsed: Metadata =
        serde_json::from_str(&json).map_err(MetadataExtractionError::MalformedResponse)?;

    if parsed.tags.len() > MAX_METADATA_TAGS {
        warn!(
            returned = parsed.tags.len(),
            kept = MAX_METADATA_TAGS,
            "model returned too many tags, keeping the first ones"
        );
    }
    Ok(Metadata::new(parsed.line_count, parsed.language, parsed.tags))
}
