//! Text-generation backends.
//!
//! Everything in the enrichment pipeline talks to a model through the
//! `GenerationClient` trait: submit a prompt, receive free text back. Two HTTP
//! backends are provided, both blocking and both with timeout and retry
//! handling.

mod client;
mod groq;
mod ollama;

pub use client::{GenerationClient, GenerationError, retry_with_backoff, retry_with_delays};
pub use groq::{GroqClient, GroqClientBuilder};
pub use ollama::{OllamaClient, OllamaClientBuilder};
