//! Groq backend over its OpenAI-compatible chat completions API.
//!
//! Each prompt is sent as a single user message and the first choice's
//! message content is returned.

use serde::{Deserialize, Serialize};

use super::client::{
    GenerationClient, GenerationError, check_status, http_client, retry_with_backoff,
};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const API_KEY_VAR: &str = "GROQ_API_KEY";
/// Mixed-case key name found in older `.env` files.
const LEGACY_API_KEY_VAR: &str = "Groq_API_Key";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Builder for constructing `GroqClient` instances.
///
/// # Examples
///
/// ```
/// use postenrich::llm::GroqClientBuilder;
///
/// let client = GroqClientBuilder::new()
///     .api_key("gsk_test")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama-3.3-70b-versatile");
/// ```
#[derive(Debug, Default)]
pub struct GroqClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

impl GroqClientBuilder {
    /// Creates a new `GroqClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the API base URL (defaults to Groq's OpenAI-compatible endpoint).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name used for every generation call.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API key used for bearer authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builds the `GroqClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// Unset builder values fall back to `GROQ_API_KEY`, `GROQ_MODEL` and
    /// `GROQ_BASE_URL`. The key is also read from `Groq_API_Key` when
    /// `GROQ_API_KEY` is unset.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::MissingApiKey` when no key is configured and
    /// `GenerationError::InvalidUrl` when the base URL does not parse.
    pub fn build(self) -> Result<GroqClient, GenerationError> {
        let api_key = [
            self.api_key,
            std::env::var(API_KEY_VAR).ok(),
            std::env::var(LEGACY_API_KEY_VAR).ok(),
        ]
        .into_iter()
        .flatten()
        .find(|key| !key.trim().is_empty())
        .ok_or(GenerationError::MissingApiKey { var: API_KEY_VAR })?;
        let model = self
            .model
            .or_else(|| std::env::var("GROQ_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = self
            .base_url
            .or_else(|| std::env::var("GROQ_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        reqwest::Url::parse(&base_url)
            .map_err(|e| GenerationError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(GroqClient {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }
}

/// Synchronous client for Groq chat completions.
pub struct GroqClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GroqClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GenerationClient for GroqClient {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .map_err(GenerationError::from_transport)?;

            check_status(response.status())?;

            let body = response.text().map_err(GenerationError::from_transport)?;
            parse_chat_response(&body)
        })
    }
}

/// Extracts the first choice's content from a chat completions reply.
fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(GenerationError::Serialization)?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::Api {
            message: "Chat completion contained no message content".to_string(),
        })
}
