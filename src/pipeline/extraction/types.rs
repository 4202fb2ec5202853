use serde::{Deserialize, Serialize};

use super::ExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Sampling parameters sent with every chat request.
///
/// Extraction wants the same answer for the same note, so temperature is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub num_ctx: u32,
    pub num_predict: i32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_k: 40,
            top_p: 0.95,
            num_ctx: 16_000,
            num_predict: 512,
        }
    }
}

/// One chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the backend to constrain output to a JSON object.
    pub json_format: bool,
    pub options: GenerationOptions,
}

/// Abstraction over the local inference backend.
pub trait LlmClient: Send + Sync {
    /// Run one chat completion and return the assistant message content.
    fn chat(&self, request: &ChatRequest) -> Result<String, ExtractionError>;

    fn is_model_available(&self, model: &str) -> Result<bool, ExtractionError>;

    fn list_models(&self) -> Result<Vec<String>, ExtractionError>;

    /// Whether concurrent `chat` calls are safe. Backends that are not get
    /// their calls serialized by the inference service.
    fn is_concurrency_safe(&self) -> bool {
        true
    }
}
