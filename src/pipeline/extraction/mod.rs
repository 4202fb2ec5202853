pub mod types;
pub mod ollama;
pub mod prompt;
pub mod sanitize;
pub mod parser;
pub mod locator;
pub mod pattern;
pub mod confidence;
pub mod missing;
pub mod client;

pub use types::*;
pub use ollama::*;
pub use prompt::*;
pub use sanitize::*;
pub use parser::*;
pub use locator::*;
pub use pattern::*;
pub use confidence::*;
pub use missing::*;
pub use client::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Model {0} is not available on the inference backend")]
    ModelNotAvailable(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Clinical note is empty")]
    EmptyNote,

    #[error("Inference service has been shut down")]
    ServiceShutdown,

    #[error("Inference service lock poisoned")]
    LockPoisoned,

    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// The backend could not be reached or did not answer in time.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::OllamaConnection(_)
                | Self::Timeout(_)
                | Self::HttpClient(_)
                | Self::ServiceShutdown
                | Self::ModelNotAvailable(_)
        )
    }
}

/// Check if an error is worth another inference call.
pub(crate) fn is_retryable_error(e: &ExtractionError) -> bool {
    matches!(
        e,
        ExtractionError::OllamaConnection(_)
            | ExtractionError::Timeout(_)
            | ExtractionError::HttpClient(_)
            | ExtractionError::OllamaError { .. }
    )
}

/// Check if an error is a parse error (worth retrying with a fresh call).
pub(crate) fn is_parse_error(e: &ExtractionError) -> bool {
    matches!(
        e,
        ExtractionError::MalformedResponse(_) | ExtractionError::JsonParsing(_)
    )
}
