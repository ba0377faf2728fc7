//! Chunked tag normalization through the generation backend.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::llm::{GenerationClient, GenerationError};
use crate::models::{FailurePolicy, TagMapping, TagMappingConflict};
use crate::repair::{MalformedResponseError, parse_mapping};

/// Number of tags sent per normalization request unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 30;

/// Prompt template for tag normalization.
///
/// Includes few-shot merge examples and an example of the expected output
/// object.
const PROMPT_TEMPLATE: &str = r#"You are given a list of hashtags or content labels extracted from influencer-style social media posts.

Your task is to unify and normalize the tags according to the following rules:

1. Merge similar or redundant tags into broader categories.
   - Example 1: "GRWM", "Get Ready", "Get Ready With Me" -> "GRWM"
   - Example 2: "Meal Prep", "What I Eat", "Diet", "Food Vlog" -> "What I Eat"
   - Example 3: "Skincare Routine", "Skin", "Glow Up" -> "Skincare"
   - Example 4: "Motivation", "Discipline", "Productivity" -> "Mindset"
   - Example 5: "Budget Life", "Spending", "Costs", "Money" -> "Budget"

2. Use title case for all unified tag names (e.g., "What I Eat", not "what i eat").

3. Return the output as a valid JSON object with no extra explanation or preamble.

4. The JSON object must map every original tag in the list to its unified version. Example:
   {
     "Meal Prep": "What I Eat",
     "Get Ready With Me": "GRWM",
     "Budget Life": "Budget"
   }

Here is the list of tags:
{tags}"#;

/// The unifier was configured with an unusable setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnifierConfigError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Why a single chunk produced no mapping.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("generation request failed: {0}")]
    Invocation(#[from] GenerationError),

    #[error(transparent)]
    MalformedResponse(#[from] MalformedResponseError),
}

/// A chunk that was skipped; its tags stay unmapped.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Zero-based position of the chunk.
    pub index: usize,
    /// The tags the chunk covered.
    pub tags: Vec<String>,
    pub error: ChunkError,
}

/// Result of a unification run.
#[derive(Debug, Default)]
pub struct Unification {
    /// Merged mapping of every chunk that succeeded.
    pub mapping: TagMapping,
    /// Chunks that were skipped, in chunk order.
    pub failed_chunks: Vec<ChunkFailure>,
    /// Number of chunks the tag set was split into.
    pub chunk_count: usize,
}

/// Builder for constructing `TagUnifier` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use postenrich::llm::OllamaClientBuilder;
/// use postenrich::unification::TagUnifierBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new().build()?;
/// let unifier = TagUnifierBuilder::new()
///     .client(Arc::new(client))
///     .chunk_size(20)
///     .build()?;
///
/// let tags = vec!["Get Ready".to_string(), "GRWM".to_string()];
/// let unification = unifier.unify(&tags)?;
/// for (tag, canonical) in unification.mapping.iter() {
///     println!("{tag} -> {canonical}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct TagUnifierBuilder {
    client: Option<Arc<dyn GenerationClient>>,
    chunk_size: usize,
}

impl Default for TagUnifierBuilder {
    fn default() -> Self {
        Self {
            client: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TagUnifierBuilder {
    /// Creates a new `TagUnifierBuilder` with the default chunk size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generation client used for normalization requests.
    pub fn client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the maximum number of tags per request.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Builds the `TagUnifier`.
    ///
    /// # Errors
    ///
    /// Returns `UnifierConfigError::ZeroChunkSize` if the chunk size is 0.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called before `build()`.
    pub fn build(self) -> Result<TagUnifier, UnifierConfigError> {
        if self.chunk_size == 0 {
            return Err(UnifierConfigError::ZeroChunkSize);
        }
        Ok(TagUnifier {
            client: self.client.expect("client must be set via client() method"),
            chunk_size: self.chunk_size,
        })
    }
}

/// Maps a corpus's tags onto canonical categories, one chunk per request.
///
/// The unifier does no semantic matching of its own; what merges into what is
/// left entirely to the model. It only partitions, prompts, repairs and merges.
pub struct TagUnifier {
    client: Arc<dyn GenerationClient>,
    chunk_size: usize,
}

impl TagUnifier {
    /// Returns the configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Failure policy of this stage.
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::FailSoft
    }

    /// Unifies `tags` chunk by chunk.
    ///
    /// The tags are deduplicated and sorted first, so chunk boundaries depend
    /// only on the tag set. A chunk whose request fails or whose response
    /// cannot be repaired is logged, recorded in `failed_chunks` and skipped.
    /// Entries the model returns for tags outside the requested chunk are
    /// ignored. An empty tag set makes no requests.
    ///
    /// # Errors
    ///
    /// Returns `TagMappingConflict` if two chunks map the same tag to
    /// different canonical tags.
    pub fn unify(&self, tags: &[String]) -> Result<Unification, TagMappingConflict> {
        let tags: Vec<&str> = tags
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut unification = Unification::default();
        for (index, chunk) in tags.chunks(self.chunk_size).enumerate() {
            unification.chunk_count += 1;

            match self.unify_chunk(index, chunk) {
                Ok(partial) => {
                    debug!(
                        chunk = index,
                        tags = chunk.len(),
                        mapped = partial.len(),
                        "unified tag chunk"
                    );
                    if let Err(conflict) = unification.mapping.merge(partial) {
                        error!(
                            chunk = index,
                            error = %conflict,
                            "tag chunks disagree on a canonical tag"
                        );
                        return Err(conflict);
                    }
                }
                Err(e) => {
                    warn!(
                        chunk = index,
                        error = %e,
                        "failed to unify tag chunk, leaving its tags unmapped"
                    );
                    unification.failed_chunks.push(ChunkFailure {
                        index,
                        tags: chunk.iter().map(|tag| tag.to_string()).collect(),
                        error: e,
                    });
                }
            }
        }

        info!(
            tags = tags.len(),
            chunks = unification.chunk_count,
            failed = unification.failed_chunks.len(),
            mapped = unification.mapping.len(),
            "tag unification finished"
        );
        Ok(unification)
    }

    fn unify_chunk(&self, index: usize, chunk: &[&str]) -> Result<TagMapping, ChunkError> {
        let prompt = render_prompt(chunk);
        let response = self.client.generate(&prompt)?;
        let partial = parse_mapping(&response)?;
        Ok(restrict_to_chunk(index, partial, chunk))
    }
}

/// Keeps only the entries for tags the chunk listed.
///
/// `chunk` must be sorted. Entries the model invented for other tags are
/// logged and dropped, so every key of the merged mapping comes from exactly
/// one chunk.
fn restrict_to_chunk(index: usize, partial: TagMapping, chunk: &[&str]) -> TagMapping {
    let (kept, extra): (Vec<_>, Vec<_>) = partial
        .into_iter()
        .partition(|(tag, _)| chunk.binary_search(&tag.as_str()).is_ok());

    if !extra.is_empty() {
        let dropped: Vec<&str> = extra.iter().map(|(tag, _)| tag.as_str()).collect();
        warn!(
            chunk = index,
            dropped = ?dropped,
            "ignoring mappings for tags outside the chunk"
        );
    }
    kept.into_iter().collect()
}

fn render_prompt(chunk: &[&str]) -> String {
    PROMPT_TEMPLATE.replace("{tags}", &chunk.join(", "))
}
