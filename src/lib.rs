pub mod config;
pub mod corpus;
pub mod extractor;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod repair;
pub mod unification;

pub use config::{Backend, Config};
pub use extractor::{MetadataExtractionError, MetadataExtractor, MetadataExtractorBuilder};
pub use llm::{GenerationClient, GenerationError};
pub use models::{EnrichedPost, FailurePolicy, Metadata, Post, TagMapping};
pub use pipeline::{EnrichmentOutcome, EnrichmentPipeline, PipelineError};
pub use unification::{TagUnifier, TagUnifierBuilder};
