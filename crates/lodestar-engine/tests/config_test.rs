use lodestar_engine::config::{AiProvider, ConfigLoader, LodestarConfig};
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[tokio::test]
async fn test_empty_file_yields_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = ConfigLoader::load_from(file.path()).await.unwrap();

    assert_eq!(config.resolver.find_timeout(), Duration::from_millis(30_000));
    assert_eq!(config.resolver.healing_timeout(), Duration::from_millis(5_000));
    assert_eq!(config.execution.max_attempts, 2);
    assert_eq!(config.ai.markup_budget, 10_000);
    assert_eq!(config.ai.resolved_model(), "claude-sonnet-4-20250514");
}

#[tokio::test]
async fn test_partial_yaml_keeps_other_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        file.path(),
        "resolver:\n  find_timeout_ms: 1000\nai:\n  provider: local\n  model: qwen2.5:7b\nexecution:\n  max_attempts: 4\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path()).await.unwrap();

    assert_eq!(config.resolver.find_timeout_ms, 1000);
    assert!(config.resolver.enable_ai);
    assert_eq!(config.ai.provider, AiProvider::Local);
    assert_eq!(config.ai.resolved_model(), "qwen2.5:7b");
    assert_eq!(config.ai.resolved_base_url(), "http://localhost:11434/v1");
    assert_eq!(config.execution.max_attempts, 4);
    assert_eq!(config.execution.command, "npx");
}

#[tokio::test]
async fn test_invalid_yaml_is_parse_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "resolver: [not, a, map]").unwrap();

    let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to parse config file"));
}

#[test]
fn test_anthropic_without_key_falls_back_to_local() {
    let mut config = LodestarConfig::default();
    ConfigLoader::apply_overrides_with(&mut config, env(&[]));

    assert_eq!(config.ai.provider, AiProvider::Local);
    assert_eq!(config.ai.resolved_model(), "llama3.2:3b");
}

#[test]
fn test_anthropic_with_key_is_kept() {
    let mut config = LodestarConfig::default();
    ConfigLoader::apply_overrides_with(&mut config, env(&[("ANTHROPIC_API_KEY", "sk-test")]));

    assert_eq!(config.ai.provider, AiProvider::Anthropic);
    assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_local_overrides() {
    let mut config = LodestarConfig::default();
    ConfigLoader::apply_overrides_with(
        &mut config,
        env(&[
            ("LODESTAR_AI_PROVIDER", "local"),
            ("LOCAL_LLM_URL", "http://127.0.0.1:1234/v1"),
            ("LOCAL_LLM_MODEL", "mistral"),
        ]),
    );

    assert_eq!(config.ai.provider, AiProvider::Local);
    assert_eq!(config.ai.resolved_base_url(), "http://127.0.0.1:1234/v1");
    assert_eq!(config.ai.resolved_model(), "mistral");
}

#[test]
fn test_unknown_provider_falls_back_to_local() {
    let mut config = LodestarConfig::default();
    ConfigLoader::apply_overrides_with(&mut config, env(&[("LODESTAR_AI_PROVIDER", "gpt-9")]));
    assert_eq!(config.ai.provider, AiProvider::Local);
}

#[test]
fn test_disabled_provider() {
    let mut config = LodestarConfig::default();
    ConfigLoader::apply_overrides_with(&mut config, env(&[("LODESTAR_AI_PROVIDER", "DISABLED")]));
    assert_eq!(config.ai.provider, AiProvider::Disabled);
}
