//! Generation client trait, error type and retry policy shared by all backends.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Errors that can occur when invoking a text-generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend reported an error or returned an unexpected payload
    #[error("Generation API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The backend needs an API key and none was configured
    #[error("Missing API key: set {var}")]
    MissingApiKey { var: &'static str },
}

impl GenerationError {
    /// Classifies a transport error as a timeout or a plain network failure.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Network(error)
        }
    }
}

/// Capability to turn a rendered prompt into raw model text.
///
/// This is the only surface the enrichment components see, so tests can
/// substitute a deterministic stub for a real backend.
pub trait GenerationClient: Send + Sync {
    /// Sends `prompt` to the model and returns its raw response text.
    ///
    /// The text is not guaranteed to be well-formed structured data.
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Backoff schedule used by the HTTP backends.
const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Retries an operation with exponential backoff.
///
/// This function will retry the operation up to 3 times with delays of 1s, 2s, and 4s.
/// It only retries on transient errors (HTTP 5xx, HTTP 429, timeouts and network errors),
/// not on other client errors.
pub fn retry_with_backoff<F, T>(f: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Result<T, GenerationError>,
{
    retry_with_delays(&DEFAULT_DELAYS, f)
}

/// Retries an operation once per entry in `delays`, sleeping that long before each retry.
///
/// Returns the first success, the first non-retryable error, or the last error once
/// the schedule is exhausted.
pub fn retry_with_delays<F, T>(delays: &[Duration], mut f: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Result<T, GenerationError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in delays.iter().enumerate() {
        debug!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "retrying generation request"
        );
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Determines if an error should be retried.
fn should_retry(error: &GenerationError) -> bool {
    match error {
        GenerationError::Network(_) => true,
        GenerationError::Timeout(_) => true,
        GenerationError::Http { status } => *status == 429 || (500..600).contains(status),
        GenerationError::Serialization(_) => false,
        GenerationError::Api { .. } => false,
        GenerationError::InvalidUrl(_) => false,
        GenerationError::MissingApiKey { .. } => false,
    }
}

/// Builds the blocking HTTP client shared by the backends.
pub(crate) fn http_client() -> Result<reqwest::blocking::Client, GenerationError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(GenerationError::Network)
}

/// Maps a non-success HTTP status to `GenerationError::Http`.
pub(crate) fn check_status(status: reqwest::StatusCode) -> Result<(), GenerationError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(GenerationError::Http {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NO_DELAYS: [Duration; 3] = [Duration::ZERO; 3];

    fn network_error() -> GenerationError {
        GenerationError::Network(
            reqwest::blocking::Client::new()
                .get("not-a-valid-url")
                .build()
                .unwrap_err(),
        )
    }

    #[test]
    fn network_error_variant_display() {
        let error_msg = format!("{}", network_error());
        assert!(error_msg.contains("Network error"));
    }

    #[test]
    fn http_error_variant_with_status_code() {
        let error = GenerationError::Http { status: 404 };

        let error_msg = format!("{}", error);
        assert!(error_msg.contains("HTTP error"));
        assert!(error_msg.contains("404"));
    }

    #[test]
    fn serialization_error_variant_wraps_serde_errors() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error = GenerationError::Serialization(json_error);

        assert!(format!("{}", error).contains("Serialization error"));
        assert!(error.source().is_some());
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let error = GenerationError::MissingApiKey {
            var: "GROQ_API_KEY",
        };
        assert_eq!(format!("{}", error), "Missing API key: set GROQ_API_KEY");
    }

    #[test]
    fn retry_succeeds_after_transient_network_error() {
        let attempts = AtomicUsize::new(0);
        let result = retry_with_delays(&NO_DELAYS, || {
            if attempts.fetch_add(1, Ordering::SeqCst) < 1 {
                Err(network_error())
            } else {
                Ok("success")
            }
        });

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_stops_after_schedule_is_exhausted() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), GenerationError> = retry_with_delays(&NO_DELAYS, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(network_error())
        });

        assert!(matches!(result, Err(GenerationError::Network(_))));
        // Initial attempt + 3 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn retry_does_not_occur_on_http_4xx_errors() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), GenerationError> = retry_with_delays(&NO_DELAYS, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Http { status: 404 })
        });

        assert!(matches!(result, Err(GenerationError::Http { status: 404 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_occurs_on_http_5xx_and_429() {
        for status in [500, 503, 429] {
            let attempts = AtomicUsize::new(0);
            let result = retry_with_delays(&NO_DELAYS, || {
                if attempts.fetch_add(1, Ordering::SeqCst) < 1 {
                    Err(GenerationError::Http { status })
                } else {
                    Ok("success")
                }
            });

            assert!(result.is_ok(), "status {status} should be retried");
            assert_eq!(attempts.load(Ordering::SeqCst), 2);
        }
    }

    #[test]
    fn retry_does_not_occur_on_api_errors() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), GenerationError> = retry_with_delays(&NO_DELAYS, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Api {
                message: "missing field".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trait_can_be_implemented_by_mock_struct() {
        struct MockClient {
            response: String,
        }

        impl GenerationClient for MockClient {
            fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
                Ok(self.response.clone())
            }
        }

        let mock = MockClient {
            response: "test response".to_string(),
        };
        assert_eq!(mock.generate("test prompt").unwrap(), "test response");
    }

    #[test]
    fn check_status_maps_failures_to_http_errors() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        assert!(matches!(
            check_status(reqwest::StatusCode::BAD_GATEWAY),
            Err(GenerationError::Http { status: 502 })
        ));
    }
}
