//! Service error taxonomy with transport-neutral status codes.

use serde::Serialize;

use crate::pipeline::decision::DecisionError;
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::processor::ProcessingError;
use crate::pipeline::retrieval::RetrievalError;
use crate::pipeline_config::ConfigError;

/// Structured error body for whichever transport forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Inference service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Processing failed: {0}")]
    ProcessingError(String),
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::ProcessingError(_) => 422,
            // Client closed request
            ApiError::Cancelled => 499,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::ProcessingError(_) => "PROCESSING_ERROR",
            ApiError::Cancelled => "CANCELLED",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                status: self.status_code(),
                message: self.to_string(),
            },
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            e @ ExtractionError::EmptyNote => ApiError::BadRequest(e.to_string()),
            ExtractionError::Cancelled => ApiError::Cancelled,
            e if e.is_unavailable() => ApiError::ServiceUnavailable(e.to_string()),
            e @ ExtractionError::OllamaError { .. } => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::ProcessingError(e.to_string()),
        }
    }
}

impl From<DecisionError> for ApiError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::MissingVolumeData(_)
            | DecisionError::NonFinite { .. }
            | DecisionError::NegativeVolume { .. } => ApiError::BadRequest(err.to_string()),
            e => {
                tracing::error!(error = %e, "Decision engine fault");
                ApiError::ProcessingError(e.to_string())
            }
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Extraction(e) => e.into(),
            ProcessingError::Decision(e) => e.into(),
            ProcessingError::Cancelled(_) => ApiError::Cancelled,
            e @ ProcessingError::WorkerPanicked(_) => {
                tracing::error!(error = %e, "Processing worker panicked");
                ApiError::ProcessingError(e.to_string())
            }
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidChunking { .. } => ApiError::BadRequest(err.to_string()),
            e => ApiError::ProcessingError(e.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
