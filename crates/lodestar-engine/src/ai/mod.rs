//! AI backend seam.
//!
//! The resolver and the healer never talk to a provider directly; they receive
//! an [`AiBackend`] at construction time so tests can substitute a fake.

pub mod adapter;
pub mod client;
pub mod parse;

pub use adapter::SuggestionAdapter;
pub use client::HttpAiBackend;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AiError {
    /// The backend could not be reached or answered with an error status.
    #[error("AI backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but not with the structure that was asked for.
    #[error("AI backend returned unparseable output: {message}")]
    Protocol { message: String, raw: String },

    #[error("AI backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("AI is disabled")]
    Disabled,

    #[error("Vision analysis not supported by provider '{0}'")]
    VisionUnsupported(String),
}

impl AiError {
    pub fn protocol(message: impl Into<String>, raw: impl Into<String>) -> Self {
        AiError::Protocol {
            message: message.into(),
            raw: raw.into(),
        }
    }
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.1,
            system: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Provider name for logs and error messages.
    fn provider(&self) -> &str;

    /// Plain text completion.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, AiError>;

    fn supports_vision(&self) -> bool {
        false
    }

    /// Completion over a PNG image plus a text prompt.
    async fn complete_with_image(
        &self,
        _prompt: &str,
        _image_png: &[u8],
        _options: &CompletionOptions,
    ) -> Result<String, AiError> {
        Err(AiError::VisionUnsupported(self.provider().to_string()))
    }
}
