//! Corpus-wide tag unification.
//!
//! Tags extracted per post are free-form, so the same idea shows up as
//! "GRWM", "Get Ready" and "Get Ready With Me". This module collects every tag
//! in the corpus, asks the generation backend to map them onto a smaller set
//! of canonical labels chunk by chunk, and rewrites each post's tags through
//! the resulting mapping.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use postenrich::llm::{GenerationClient, GenerationError};
//! use postenrich::models::{EnrichedPost, Metadata, Post};
//! use postenrich::unification::{TagUnifierBuilder, collect_tags, rewrite_tags};
//!
//! struct Canned;
//!
//! impl GenerationClient for Canned {
//!     fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
//!         Ok(r#"{"GRWM": "GRWM", "Get Ready": "GRWM"}"#.to_string())
//!     }
//! }
//!
//! let mut posts = vec![
//!     EnrichedPost::new(Post::new("a"), Metadata::new(1, "English", vec!["GRWM".into()])),
//!     EnrichedPost::new(Post::new("b"), Metadata::new(1, "English", vec!["Get Ready".into()])),
//! ];
//!
//! let unifier = TagUnifierBuilder::new().client(Arc::new(Canned)).build()?;
//! let unification = unifier.unify(&collect_tags(&posts))?;
//! rewrite_tags(&mut posts, &unification.mapping);
//!
//! assert_eq!(posts[0].tags, vec!["GRWM"]);
//! assert_eq!(posts[1].tags, vec!["GRWM"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod aggregator;
mod rewriter;
mod unifier;

pub use aggregator::collect_tags;
pub use rewriter::{canonicalize_tags, rewrite_tags};
pub use unifier::{
    ChunkError, ChunkFailure, DEFAULT_CHUNK_SIZE, TagUnifier, TagUnifierBuilder, Unification,
    UnifierConfigError,
};
