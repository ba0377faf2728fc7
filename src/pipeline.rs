//! End-to-end enrichment of a post corpus.
//!
//! Stages run in order on a single thread: metadata extraction for every post,
//! tag aggregation, chunked tag unification and tag rewriting. Extraction
//! fails hard, so either every post gets metadata or the run returns an error
//! and nothing is handed back for writing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::extractor::{MetadataExtractionError, MetadataExtractor};
use crate::llm::GenerationClient;
use crate::models::{EnrichedPost, Post, TagMapping, TagMappingConflict};
use crate::unification::{
    ChunkFailure, TagUnifier, TagUnifierBuilder, UnifierConfigError, collect_tags, rewrite_tags,
};

/// Errors that abort an enrichment run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("metadata extraction failed for post {index}")]
    MetadataExtraction {
        index: usize,
        #[source]
        source: MetadataExtractionError,
    },

    #[error(transparent)]
    MappingConflict(#[from] TagMappingConflict),
}

/// Output of a successful run.
#[derive(Debug)]
pub struct EnrichmentOutcome {
    /// Posts with metadata and canonical tags, in input order.
    pub posts: Vec<EnrichedPost>,
    /// The mapping the tags were rewritten with.
    pub mapping: TagMapping,
    /// Unification chunks that were skipped.
    pub failed_chunks: Vec<ChunkFailure>,
}

/// Runs the extraction and unification stages over a corpus.
pub struct EnrichmentPipeline {
    extractor: MetadataExtractor,
    unifier: TagUnifier,
}

impl EnrichmentPipeline {
    /// Assembles a pipeline from already configured stages.
    pub fn new(extractor: MetadataExtractor, unifier: TagUnifier) -> Self {
        Self { extractor, unifier }
    }

    /// Builds both stages around one shared client.
    ///
    /// # Errors
    ///
    /// Returns `UnifierConfigError` if `chunk_size` is 0.
    pub fn with_client(
        client: Arc<dyn GenerationClient>,
        chunk_size: usize,
    ) -> Result<Self, UnifierConfigError> {
        let unifier = TagUnifierBuilder::new()
            .client(Arc::clone(&client))
            .chunk_size(chunk_size)
            .build()?;
        Ok(Self::new(MetadataExtractor::new(client), unifier))
    }

    /// Enriches `posts`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MetadataExtraction` for the first post whose
    /// metadata cannot be extracted, and `PipelineError::MappingConflict` if
    /// unification produced contradictory chunk mappings. Skipped unification
    /// chunks are not errors; they are reported in the outcome.
    pub fn run(&self, posts: Vec<Post>) -> Result<EnrichmentOutcome, PipelineError> {
        info!(
            posts = posts.len(),
            policy = %self.extractor.failure_policy(),
            "extracting post metadata"
        );
        let mut enriched = self.extract_all(posts)?;

        let tags = collect_tags(&enriched);
        info!(
            tags = tags.len(),
            chunk_size = self.unifier.chunk_size(),
            policy = %self.unifier.failure_policy(),
            "unifying tags"
        );
        let unification = self.unifier.unify(&tags)?;

        rewrite_tags(&mut enriched, &unification.mapping);

        Ok(EnrichmentOutcome {
            posts: enriched,
            mapping: unification.mapping,
            failed_chunks: unification.failed_chunks,
        })
    }

    fn extract_all(&self, posts: Vec<Post>) -> Result<Vec<EnrichedPost>, PipelineError> {
        posts
            .into_iter()
            .enumerate()
            .map(|(index, post)| {
                debug!(post = index, "extracting metadata");
                let metadata = self
                    .extractor
                    .extract(&post.text)
                    .map_err(|source| PipelineError::MetadataExtraction { index, source })?;
                Ok(EnrichedPost::new(post, metadata))
            })
            .collect()
    }
}
