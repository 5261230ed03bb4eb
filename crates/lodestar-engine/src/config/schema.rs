use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LodestarConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_find_timeout_ms")]
    pub find_timeout_ms: u64,
    #[serde(default = "default_healing_timeout_ms")]
    pub healing_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_ai: bool,
    #[serde(default = "default_true")]
    pub enable_self_healing: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            find_timeout_ms: default_find_timeout_ms(),
            healing_timeout_ms: default_healing_timeout_ms(),
            enable_ai: true,
            enable_self_healing: true,
        }
    }
}

impl ResolverConfig {
    pub fn find_timeout(&self) -> Duration {
        Duration::from_millis(self.find_timeout_ms)
    }

    pub fn healing_timeout(&self) -> Duration {
        Duration::from_millis(self.healing_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Anthropic,
    /// OpenAI-compatible local server (Ollama, LM Studio, ...).
    Local,
    Disabled,
}

impl AiProvider {
    /// Parse a provider name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(AiProvider::Anthropic),
            "local" => Some(AiProvider::Local),
            "disabled" => Some(AiProvider::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Anthropic => "anthropic",
            AiProvider::Local => "local",
            AiProvider::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,
    /// Overrides the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_healer_max_tokens")]
    pub healer_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Characters of page markup sent per request.
    #[serde(default = "default_markup_budget")]
    pub markup_budget: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_ms: default_ai_timeout_ms(),
            max_tokens: default_max_tokens(),
            healer_max_tokens: default_healer_max_tokens(),
            temperature: default_temperature(),
            markup_budget: default_markup_budget(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn resolved_model(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider {
            AiProvider::Anthropic => "claude-sonnet-4-20250514".to_string(),
            AiProvider::Local | AiProvider::Disabled => "llama3.2:3b".to_string(),
        }
    }

    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            AiProvider::Anthropic => "https://api.anthropic.com".to_string(),
            AiProvider::Local | AiProvider::Disabled => "http://localhost:11434/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Program used to run a test script.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments; `{script}` is replaced with the script path.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_process_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            command: default_command(),
            args: default_args(),
            cwd: None,
            timeout_ms: default_process_timeout_ms(),
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            persist: true,
        }
    }
}

impl HistoryConfig {
    /// Path to persist to, or `None` for an in-memory history.
    pub fn effective_path(&self) -> Option<&PathBuf> {
        if self.persist { self.path.as_ref() } else { None }
    }
}

fn default_true() -> bool {
    true
}

fn default_find_timeout_ms() -> u64 {
    30000
}

fn default_healing_timeout_ms() -> u64 {
    5000
}

fn default_ai_timeout_ms() -> u64 {
    60000
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_healer_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_markup_budget() -> usize {
    10000
}

fn default_max_attempts() -> u32 {
    2
}

fn default_command() -> String {
    "npx".to_string()
}

fn default_args() -> Vec<String> {
    ["playwright", "test", "{script}", "--project=chromium"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_process_timeout_ms() -> u64 {
    600000
}

fn default_history_path() -> Option<PathBuf> {
    Some(PathBuf::from("test-results/healing-history.json"))
}
