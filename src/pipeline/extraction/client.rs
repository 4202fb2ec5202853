use std::sync::Arc;
use std::time::Duration;

use crate::inference_service::InferenceService;
use crate::models::ExtractionType;
use crate::pipeline::cancel::CancelFlag;
use crate::pipeline_config::PipelineConfig;

use super::parser::{parse_extraction_response, ParsedExtraction};
use super::prompt::build_messages;
use super::types::{ChatRequest, GenerationOptions};
use super::{is_parse_error, is_retryable_error, ExtractionError};

/// A validated model answer and how many calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnswer {
    pub parsed: ParsedExtraction,
    pub model_name: String,
    pub attempts: u32,
}

/// Prompts the inference service for one field and validates the answer,
/// retrying transport failures and malformed output with exponential backoff.
pub struct ExtractionClient {
    service: Arc<InferenceService>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl ExtractionClient {
    pub fn new(service: Arc<InferenceService>, max_attempts: u32, retry_backoff: Duration) -> Self {
        Self {
            service,
            max_attempts: max_attempts.max(1),
            retry_backoff,
        }
    }

    pub fn from_config(service: Arc<InferenceService>, config: &PipelineConfig) -> Self {
        Self::new(
            service,
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub fn service(&self) -> &Arc<InferenceService> {
        &self.service
    }

    pub fn extract(
        &self,
        field: ExtractionType,
        context: &str,
        cancel: &CancelFlag,
    ) -> Result<ModelAnswer, ExtractionError> {
        let request = ChatRequest {
            model: self.service.model().to_string(),
            messages: build_messages(field, context),
            json_format: true,
            options: GenerationOptions::default(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ExtractionError::Cancelled);
            }

            match self.call_once(field, &request) {
                Ok(parsed) => {
                    tracing::debug!(field = %field, attempt, "Extraction parsed");
                    return Ok(ModelAnswer {
                        parsed,
                        model_name: request.model.clone(),
                        attempts: attempt,
                    });
                }
                Err(e)
                    if (is_retryable_error(&e) || is_parse_error(&e))
                        && attempt < self.max_attempts =>
                {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        field = %field,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Extraction attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => {
                    tracing::warn!(field = %field, attempt, error = %e, "Extraction failed");
                    return Err(e);
                }
            }
        }
    }

    fn call_once(
        &self,
        field: ExtractionType,
        request: &ChatRequest,
    ) -> Result<ParsedExtraction, ExtractionError> {
        let raw = {
            let lease = self.service.acquire()?;
            lease.chat(request)?
        };
        parse_extraction_response(field, &raw)
    }

    /// `retry_backoff · 2^(attempt-1)`
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}
