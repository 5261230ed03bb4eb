use super::schema::{AiProvider, LodestarConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./lodestar.yaml
    /// 2. ~/.lodestar/config.yaml
    /// 3. Default configuration
    ///
    /// Environment overrides are applied on top.
    pub async fn load_default() -> Result<LodestarConfig, ConfigError> {
        let mut config = Self::load_file_or_default().await?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    async fn load_file_or_default() -> Result<LodestarConfig, ConfigError> {
        let local_config = PathBuf::from("./lodestar.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".lodestar").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(LodestarConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<LodestarConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: LodestarConfig = if content.trim().is_empty() {
            LodestarConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply_env_overrides(config: &mut LodestarConfig) {
        Self::apply_overrides_with(config, |key| std::env::var(key).ok());
    }

    /// Apply provider overrides using `lookup` for environment access.
    ///
    /// `anthropic` without an API key falls back to the local provider, as does
    /// an unrecognised provider name.
    pub fn apply_overrides_with<F>(config: &mut LodestarConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let ai = &mut config.ai;

        if let Some(name) = lookup("LODESTAR_AI_PROVIDER") {
            ai.provider = AiProvider::from_name(&name).unwrap_or_else(|| {
                warn!("Unknown AI provider '{}', falling back to local", name);
                AiProvider::Local
            });
        }

        match ai.provider {
            AiProvider::Anthropic => {
                if let Some(key) = lookup("ANTHROPIC_API_KEY") {
                    ai.api_key = Some(key);
                }
                if ai.api_key.is_none() {
                    warn!("ANTHROPIC_API_KEY not found, falling back to local LLM");
                    ai.provider = AiProvider::Local;
                    ai.model = None;
                    ai.base_url = None;
                }
            }
            AiProvider::Local | AiProvider::Disabled => {}
        }

        if ai.provider == AiProvider::Local {
            if let Some(url) = lookup("LOCAL_LLM_URL") {
                ai.base_url = Some(url);
            }
            if let Some(model) = lookup("LOCAL_LLM_MODEL") {
                ai.model = Some(model);
            }
            if let Some(key) = lookup("LOCAL_LLM_API_KEY") {
                ai.api_key = Some(key);
            }
        }
    }
}
