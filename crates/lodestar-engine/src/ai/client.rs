//! HTTP backends for Anthropic's Messages API and OpenAI-compatible
//! chat-completion servers.

use super::{AiBackend, AiError, CompletionOptions};
use crate::config::schema::{AiConfig, AiProvider};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Provider-specific HTTP client selected from [`AiConfig`].
#[derive(Debug, Clone)]
pub struct HttpAiBackend {
    provider: AiProvider,
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpAiBackend {
    pub fn from_config(config: &AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_default();
        Self {
            provider: config.provider,
            client,
            base_url: config.resolved_base_url(),
            model: config.resolved_model(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn anthropic_request(
        &self,
        content: Value,
        options: &CompletionOptions,
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: options.system.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        }
    }

    fn chat_request(&self, content: Value, options: &CompletionOptions) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Value::String(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        request: reqwest::RequestBuilder,
        body: &T,
    ) -> Result<String, AiError> {
        let resp = request
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::Unavailable(format!("{} request failed: {}", self.provider(), e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AiError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(AiError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }
        Ok(text)
    }

    async fn send_anthropic(&self, request: &MessagesRequest) -> Result<String, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Unavailable("ANTHROPIC_API_KEY is not set".to_string()))?;
        let url = format!("{}/v1/messages", self.base_url);
        debug!("POST {} (model {})", url, self.model);

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let body = self.post_json(builder, request).await?;

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::protocol(format!("unexpected response shape: {}", e), &body))?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| AiError::protocol("response has no text content", body))
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (model {})", url, self.model);

        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let body = self.post_json(builder, request).await?;

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::protocol(format!("unexpected response shape: {}", e), &body))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AiError::protocol("response has no choices", body))
    }
}

#[async_trait]
impl AiBackend for HttpAiBackend {
    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, AiError> {
        let content = Value::String(prompt.to_string());
        match self.provider {
            AiProvider::Disabled => Err(AiError::Disabled),
            AiProvider::Anthropic => {
                self.send_anthropic(&self.anthropic_request(content, options))
                    .await
            }
            AiProvider::Local => self.send_chat(&self.chat_request(content, options)).await,
        }
    }

    fn supports_vision(&self) -> bool {
        self.provider == AiProvider::Anthropic
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image_png: &[u8],
        options: &CompletionOptions,
    ) -> Result<String, AiError> {
        match self.provider {
            AiProvider::Disabled => Err(AiError::Disabled),
            AiProvider::Local => Err(AiError::VisionUnsupported(self.provider().to_string())),
            AiProvider::Anthropic => {
                let content = image_content(prompt, image_png);
                self.send_anthropic(&self.anthropic_request(content, options))
                    .await
            }
        }
    }
}

fn image_content(prompt: &str, image_png: &[u8]) -> Value {
    json!([
        {
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": "image/png",
                "data": STANDARD.encode(image_png),
            }
        },
        { "type": "text", "text": prompt }
    ])
}
