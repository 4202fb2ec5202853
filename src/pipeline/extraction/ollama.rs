use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ChatMessage, ChatRequest, GenerationOptions, LlmClient};
use super::ExtractionError;
use crate::pipeline_config::PipelineConfig;

/// How long Ollama keeps the model resident between requests.
const KEEP_ALIVE: &str = "10m";

/// Ollama HTTP client for local chat inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    generation_timeout_secs: u64,
}

impl OllamaClient {
    /// Connect timeout bounds reaching the server; generation timeout bounds
    /// the whole request including inference.
    pub fn new(
        base_url: &str,
        connect_timeout_secs: u64,
        generation_timeout_secs: u64,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(generation_timeout_secs))
            .build()
            .map_err(|e| ExtractionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            generation_timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ExtractionError> {
        Self::new(
            &config.ollama_url,
            config.connect_timeout_secs,
            config.generation_timeout_secs,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_connect() {
            ExtractionError::OllamaConnection(self.base_url.clone())
        } else if e.is_timeout() {
            ExtractionError::Timeout(self.generation_timeout_secs)
        } else {
            ExtractionError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    keep_alive: &'a str,
    options: &'a GenerationOptions,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn chat(&self, request: &ChatRequest) -> Result<String, ExtractionError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            format: request.json_format.then_some("json"),
            keep_alive: KEEP_ALIVE,
            options: &request.options,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        Ok(parsed.message.content)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, ExtractionError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Mock LLM client for testing: returns a configurable response.
pub struct MockLlmClient {
    response: String,
    available_models: Vec<String>,
    concurrency_safe: bool,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            available_models: vec!["phi4:14b".to_string()],
            concurrency_safe: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn not_concurrency_safe(mut self) -> Self {
        self.concurrency_safe = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn chat(&self, _request: &ChatRequest) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    fn is_model_available(&self, model: &str) -> Result<bool, ExtractionError> {
        Ok(self.available_models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        Ok(self.available_models.clone())
    }

    fn is_concurrency_safe(&self) -> bool {
        self.concurrency_safe
    }
}

/// Mock client that replays a fixed sequence of outcomes, then repeats the
/// last one. Used to exercise retries.
pub struct SequencedLlmClient {
    outcomes: Mutex<VecDeque<Result<String, ExtractionError>>>,
    last: Mutex<Option<Result<String, ExtractionError>>>,
    calls: AtomicUsize,
}

impl SequencedLlmClient {
    pub fn new(outcomes: Vec<Result<String, ExtractionError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Recreate an outcome; errors are not `Clone`.
fn replay(outcome: &Result<String, ExtractionError>) -> Result<String, ExtractionError> {
    match outcome {
        Ok(s) => Ok(s.clone()),
        Err(ExtractionError::OllamaConnection(url)) => {
            Err(ExtractionError::OllamaConnection(url.clone()))
        }
        Err(ExtractionError::Timeout(secs)) => Err(ExtractionError::Timeout(*secs)),
        Err(ExtractionError::OllamaError { status, body }) => Err(ExtractionError::OllamaError {
            status: *status,
            body: body.clone(),
        }),
        Err(ExtractionError::MalformedResponse(m)) => {
            Err(ExtractionError::MalformedResponse(m.clone()))
        }
        Err(e) => Err(ExtractionError::HttpClient(e.to_string())),
    }
}

impl LlmClient for SequencedLlmClient {
    fn chat(&self, _request: &ChatRequest) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().map_err(|_| ExtractionError::LockPoisoned)?;
        let mut last = self.last.lock().map_err(|_| ExtractionError::LockPoisoned)?;
        if let Some(next) = outcomes.pop_front() {
            let result = replay(&next);
            *last = Some(next);
            return result;
        }
        match last.as_ref() {
            Some(outcome) => replay(outcome),
            None => Err(ExtractionError::MalformedResponse("no scripted response".into())),
        }
    }

    fn is_model_available(&self, _model: &str) -> Result<bool, ExtractionError> {
        Ok(true)
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        Ok(vec!["phi4:14b".to_string()])
    }
}
