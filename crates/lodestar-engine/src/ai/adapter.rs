use super::parse::parse_json;
use super::{AiBackend, AiError, CompletionOptions};
use crate::config::schema::AiConfig;
use lodestar_common::{AiSuggestion, Locator, VisualVerdict};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MARKUP_BUDGET: usize = 10_000;
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_millis(60_000);

const TRUNCATION_MARKER: &str = "...[truncated]";

const SYSTEM_PROMPT: &str =
    "You are a web automation expert. Always respond with valid JSON only, no additional text.";

/// Cut `markup` to at most `budget` characters, marking the cut.
pub fn truncate_markup(markup: &str, budget: usize) -> String {
    match markup.char_indices().nth(budget) {
        Some((byte_idx, _)) => format!("{}{}", &markup[..byte_idx], TRUNCATION_MARKER),
        None => markup.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupWire {
    #[serde(default)]
    primary_selector: Option<String>,
    #[serde(default)]
    selector_type: Option<String>,
    #[serde(default)]
    fallback_selectors: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealWire {
    #[serde(default)]
    diagnosis: Option<String>,
    #[serde(default)]
    new_selectors: Vec<String>,
    #[serde(default)]
    robust_strategy: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn clamp_confidence(value: Option<f64>) -> f64 {
    value.filter(|c| c.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0)
}

fn non_empty(selectors: Vec<String>) -> impl Iterator<Item = String> {
    selectors.into_iter().filter(|s| !s.trim().is_empty())
}

/// Turns page markup and an element description into structured locator
/// suggestions using an [`AiBackend`].
#[derive(Clone)]
pub struct SuggestionAdapter {
    backend: Arc<dyn AiBackend>,
    markup_budget: usize,
    timeout: Duration,
    options: CompletionOptions,
}

impl SuggestionAdapter {
    pub fn new(backend: Arc<dyn AiBackend>) -> Self {
        Self {
            backend,
            markup_budget: DEFAULT_MARKUP_BUDGET,
            timeout: DEFAULT_AI_TIMEOUT,
            options: CompletionOptions::default().with_system(SYSTEM_PROMPT),
        }
    }

    pub fn from_config(backend: Arc<dyn AiBackend>, config: &AiConfig) -> Self {
        Self {
            backend,
            markup_budget: config.markup_budget,
            timeout: config.timeout(),
            options: CompletionOptions {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                system: Some(SYSTEM_PROMPT.to_string()),
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<F>(&self, call: F) -> Result<String, AiError>
    where
        F: Future<Output = Result<String, AiError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
    }

    /// Ask for the best locator for `description` on the page described by `markup`.
    pub async fn suggest(&self, markup: &str, description: &str) -> Result<AiSuggestion, AiError> {
        info!("AI finding element: {}", description);
        let prompt = lookup_prompt(&truncate_markup(markup, self.markup_budget), description);
        let raw = self
            .bounded(self.backend.complete(&prompt, &self.options))
            .await?;

        let wire: LookupWire = parse_json(&raw)?;
        let primary = wire
            .primary_selector
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AiError::protocol("response has no primarySelector", &raw))?;

        let suggestion = AiSuggestion {
            primary: Some(Locator::from_typed(&primary, wire.selector_type.as_deref())),
            fallbacks: non_empty(wire.fallback_selectors)
                .map(|s| Locator::parse(&s))
                .collect(),
            confidence: clamp_confidence(wire.confidence),
            diagnosis: None,
            reasoning: wire.reasoning,
        };
        info!(
            "AI suggested {} (confidence {:.2})",
            primary, suggestion.confidence
        );
        Ok(suggestion)
    }

    /// Ask for a replacement for a locator that no longer resolves.
    ///
    /// The first proposed selector becomes the primary candidate. A response
    /// with no selectors yields an empty suggestion rather than an error.
    pub async fn heal(
        &self,
        markup: &str,
        failed: &Locator,
        description: &str,
    ) -> Result<AiSuggestion, AiError> {
        info!("AI self-healing for: {}", description);
        let prompt = heal_prompt(
            &truncate_markup(markup, self.markup_budget),
            failed,
            description,
        );
        let raw = self
            .bounded(self.backend.complete(&prompt, &self.options))
            .await?;

        let wire: HealWire = parse_json(&raw)?;
        let mut selectors = non_empty(wire.new_selectors).map(|s| Locator::parse(&s));
        let primary = selectors.next();
        let fallbacks: Vec<Locator> = selectors.collect();

        if primary.is_none() {
            warn!("AI heal for '{}' proposed no selectors", description);
        }
        Ok(AiSuggestion {
            primary,
            fallbacks,
            confidence: clamp_confidence(wire.confidence),
            diagnosis: wire.diagnosis,
            reasoning: wire.robust_strategy,
        })
    }

    /// Check a screenshot against an expected visual state.
    ///
    /// Providers without vision return [`VisualVerdict::vision_unavailable`].
    pub async fn analyze_screenshot(
        &self,
        image_png: &[u8],
        expected_state: &str,
    ) -> Result<VisualVerdict, AiError> {
        if !self.backend.supports_vision() {
            warn!(
                "Provider '{}' has no vision capability, skipping screenshot analysis",
                self.backend.provider()
            );
            return Ok(VisualVerdict::vision_unavailable());
        }

        let prompt = screenshot_prompt(expected_state);
        let raw = self
            .bounded(
                self.backend
                    .complete_with_image(&prompt, image_png, &self.options),
            )
            .await?;
        let mut verdict: VisualVerdict = parse_json(&raw)?;
        verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
        info!(
            "Visual validation: {} ({:.2} confidence)",
            if verdict.matches { "PASS" } else { "FAIL" },
            verdict.confidence
        );
        Ok(verdict)
    }
}

fn lookup_prompt(markup: &str, description: &str) -> String {
    format!(
        r#"Analyze the following HTML and provide the best CSS selector or XPath for the element described.

HTML Content:
{markup}

Element Description: {description}

Respond with JSON in exactly this structure:
{{
  "primarySelector": "css selector or xpath",
  "selectorType": "css" or "xpath",
  "fallbackSelectors": ["alternative selector 1", "alternative selector 2"],
  "confidence": 0.95,
  "reasoning": "why this selector was chosen"
}}"#
    )
}

fn heal_prompt(markup: &str, failed: &Locator, description: &str) -> String {
    format!(
        r#"The element selector "{failed}" no longer works.

HTML Content:
{markup}

Original element description: {description}
Failed selector: {failed}

Explain why the selector failed and suggest new selectors that match the element now.

Respond with JSON in exactly this structure:
{{
  "diagnosis": "reason for failure",
  "newSelectors": ["selector1", "selector2"],
  "robustStrategy": "recommendation for future-proof selectors",
  "confidence": 0.85
}}"#,
        failed = failed.value()
    )
}

fn screenshot_prompt(expected_state: &str) -> String {
    format!(
        r#"Analyze this screenshot and determine if it matches the expected state: "{expected_state}"

Respond with JSON in exactly this structure:
{{
  "matches": true,
  "confidence": 0.95,
  "observations": ["what you see in the image"],
  "issues": ["any problems or discrepancies"],
  "suggestions": ["recommendations if state doesn't match"]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodestar_common::LocatorKind;

    struct Canned(String);

    #[async_trait]
    impl AiBackend for Canned {
        fn provider(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, AiError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl AiBackend for Slow {
        fn provider(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, AiError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn adapter(reply: &str) -> SuggestionAdapter {
        SuggestionAdapter::new(Arc::new(Canned(reply.to_string())))
    }

    #[test]
    fn test_truncate_markup_appends_marker() {
        assert_eq!(truncate_markup("abcdef", 3), "abc...[truncated]");
        assert_eq!(truncate_markup("abc", 3), "abc");
        assert_eq!(truncate_markup("héllo", 2), "hé...[truncated]");
    }

    #[tokio::test]
    async fn test_suggest_parses_fenced_reply() {
        let reply = "```json\n{\"primarySelector\": \"//button[@id='go']\", \"selectorType\": \"xpath\", \"fallbackSelectors\": [\"#go\", \"\"], \"confidence\": 1.7}\n```";
        let s = adapter(reply).suggest("<html/>", "go button").await.unwrap();

        assert_eq!(s.primary.as_ref().map(|l| l.kind()), Some(LocatorKind::Xpath));
        assert_eq!(s.fallbacks, vec![Locator::css("#go")]);
        assert_eq!(s.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_suggest_without_primary_is_protocol_error() {
        let err = adapter(r##"{"primarySelector": "  ", "fallbackSelectors": ["#a"]}"##)
            .suggest("<html/>", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_suggest_prose_is_protocol_error_with_raw() {
        let err = adapter("I could not find it, sorry.")
            .suggest("<html/>", "a")
            .await
            .unwrap_err();
        match err {
            AiError::Protocol { raw, .. } => assert!(raw.contains("sorry")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heal_splits_primary_and_fallbacks() {
        let reply = r##"{"diagnosis": "id changed", "newSelectors": ["#login-v2", "button.login"], "confidence": 0.85}"##;
        let s = adapter(reply)
            .heal("<html/>", &Locator::css("#login"), "login button")
            .await
            .unwrap();

        assert_eq!(s.primary, Some(Locator::css("#login-v2")));
        assert_eq!(s.fallbacks, vec![Locator::css("button.login")]);
        assert_eq!(s.diagnosis.as_deref(), Some("id changed"));
    }

    #[tokio::test]
    async fn test_heal_with_no_selectors_is_empty() {
        let s = adapter(r#"{"diagnosis": "gone", "newSelectors": []}"#)
            .heal("<html/>", &Locator::css("#x"), "x")
            .await
            .unwrap();
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_ai_timeout() {
        let slow = SuggestionAdapter::new(Arc::new(Slow)).with_timeout(Duration::from_millis(20));
        let err = slow.suggest("<html/>", "a").await.unwrap_err();
        assert!(matches!(err, AiError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_screenshot_without_vision_is_stubbed() {
        let verdict = adapter("{}")
            .analyze_screenshot(&[0u8; 4], "logged in")
            .await
            .unwrap();
        assert!(verdict.matches);
        assert_eq!(verdict.confidence, 0.5);
    }
}
