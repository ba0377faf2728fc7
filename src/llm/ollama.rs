//! Ollama HTTP backend.
//!
//! Calls `POST {base_url}/api/generate` with streaming disabled and returns the
//! `response` field of the reply.

use super::client::{
    GenerationClient, GenerationError, check_status, http_client, retry_with_backoff,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use postenrich::llm::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.2")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.2");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API (e.g., "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name used for every generation call.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, falling back to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL` is
    /// used, falling back to `llama3.2`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::InvalidUrl` if the base URL does not parse.
    pub fn build(self) -> Result<OllamaClient, GenerationError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| GenerationError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(OllamaClient {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

/// Synchronous HTTP client for the Ollama API.
///
/// It should be constructed using `OllamaClientBuilder`.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_internal(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(GenerationError::from_transport)?;

            check_status(response.status())?;

            let json: serde_json::Value =
                response.json().map_err(GenerationError::from_transport)?;
            parse_generate_response(&json)
        })
    }
}

impl GenerationClient for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_internal(prompt)
    }
}

/// Extracts the generated text from an `/api/generate` reply.
fn parse_generate_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    if let Some(message) = json.get("error").and_then(|v| v.as_str()) {
        return Err(GenerationError::Api {
            message: message.to_string(),
        });
    }

    json.get("response")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| GenerationError::Api {
            message: "Missing 'response' field in API response".to_string(),
        })
}
