//! Run configuration.
//!
//! Values come from the environment (including a `.env` file loaded by the
//! binary) and can be overridden field by field from the command line.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::llm::{GenerationClient, GenerationError, GroqClientBuilder, OllamaClientBuilder};
use crate::unification::DEFAULT_CHUNK_SIZE;

/// Errors in environment-provided configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown backend {0:?} (expected \"groq\" or \"ollama\")")]
    UnknownBackend(String),

    #[error("invalid POSTENRICH_CHUNK_SIZE {value:?}: {source}")]
    InvalidChunkSize {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Which generation service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Groq's hosted models.
    #[default]
    Groq,
    /// A local or remote Ollama server.
    Ollama,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Settings for one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    /// Model override; each backend has its own env var and default otherwise.
    pub model: Option<String>,
    /// Base URL override for the backend's API.
    pub base_url: Option<String>,
    /// Tags per unification request. Zero is rejected when the unifier is built.
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: None,
            base_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Reads `POSTENRICH_BACKEND` and `POSTENRICH_CHUNK_SIZE`, using defaults
    /// for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("POSTENRICH_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Ok(value) = std::env::var("POSTENRICH_CHUNK_SIZE") {
            config.chunk_size =
                value
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidChunkSize {
                        value: value.clone(),
                        source,
                    })?;
        }

        Ok(config)
    }

    /// Builds the generation client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the backend cannot be configured, e.g. a
    /// missing Groq API key or an invalid base URL.
    pub fn build_client(&self) -> Result<Arc<dyn GenerationClient>, GenerationError> {
        let client: Arc<dyn GenerationClient> = match self.backend {
            Backend::Groq => {
                let mut builder = GroqClientBuilder::new();
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(url) = &self.base_url {
                    builder = builder.base_url(url);
                }
                Arc::new(builder.build()?)
            }
            Backend::Ollama => {
                let mut builder = OllamaClientBuilder::new();
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(url) = &self.base_url {
                    builder = builder.base_url(url);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(client)
    }
}
