//! Script-level healing: turn a failing test script plus its failure output
//! into a patched, runnable script.

use super::classify::{FailureAnalysis, error_excerpt};
use super::error::HealingError;
use crate::ai::parse::{extract_json, strip_code_fences};
use crate::ai::{AiBackend, AiError, CompletionOptions};
use crate::config::schema::AiConfig;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Markers that identify a structured analysis returned in place of code.
const ANALYSIS_MARKERS: [&str; 4] = [
    "\"Root Cause Analysis\"",
    "\"Specific Fix\"",
    "\"Prevention Strategy\"",
    "\"rootCause\"",
];

const HEALER_SYSTEM: &str = "You are a test healing expert for Playwright test suites.";

const GENERATOR_SYSTEM: &str = "You are a Playwright test code generator. Return ONLY executable JavaScript code, never JSON or explanations.";

/// True when `code` looks like a runnable test file.
pub fn is_runnable(code: &str) -> bool {
    code.contains("test(") || code.contains("test.describe(")
}

/// True when `text` is a structured analysis rather than source code.
pub fn looks_like_analysis(text: &str) -> bool {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return false;
    }
    ANALYSIS_MARKERS.iter().any(|m| trimmed.contains(m))
        || serde_json::from_str::<Value>(trimmed).is_ok()
}

/// Code carried by a healer reply: `fixedCode`, `solutions[0].code`,
/// `solutions[0]` as a string, or the reply itself when it is not JSON.
pub fn extract_code(reply: &str) -> Option<String> {
    if let Some(obj) = reply_object(reply) {
        if let Some(code) = obj.get("fixedCode").and_then(Value::as_str) {
            return Some(strip_code_fences(code));
        }
        let first = obj
            .get("solutions")
            .and_then(Value::as_array)
            .and_then(|s| s.first());
        return match first {
            Some(Value::Object(solution)) => solution
                .get("code")
                .and_then(Value::as_str)
                .map(strip_code_fences),
            Some(Value::String(code)) => Some(strip_code_fences(code)),
            _ => None,
        };
    }
    let cleaned = strip_code_fences(reply);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// The JSON object a reply consists of, or one embedded in it that carries code.
/// Object literals inside plain source code are not replies.
fn reply_object(reply: &str) -> Option<Map<String, Value>> {
    let payload = extract_json(reply)?;
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(payload) else {
        return None;
    };
    let whole_reply = strip_code_fences(reply) == payload.trim();
    (whole_reply || obj.contains_key("fixedCode") || obj.contains_key("solutions")).then_some(obj)
}

fn accept(code: Option<String>) -> Option<String> {
    code.filter(|c| is_runnable(c) && !looks_like_analysis(c))
}

/// Context for one healing pass.
#[derive(Debug, Clone)]
pub struct HealRequest<'a> {
    pub script: &'a str,
    pub output: &'a str,
    pub analysis: &'a FailureAnalysis,
    pub requirements: Option<&'a str>,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealedScript {
    pub code: String,
    /// True when the code came from the stricter regeneration request.
    pub regenerated: bool,
    pub fixes_applied: Vec<String>,
}

#[derive(Clone)]
pub struct Healer {
    backend: Arc<dyn AiBackend>,
    options: CompletionOptions,
    timeout: Duration,
}

impl Healer {
    pub fn new(backend: Arc<dyn AiBackend>) -> Self {
        Self {
            backend,
            options: CompletionOptions::default().with_max_tokens(2000),
            timeout: Duration::from_millis(60_000),
        }
    }

    pub fn from_config(backend: Arc<dyn AiBackend>, config: &AiConfig) -> Self {
        Self {
            backend,
            options: CompletionOptions {
                max_tokens: config.healer_max_tokens,
                temperature: config.temperature,
                system: None,
            },
            timeout: config.timeout(),
        }
    }

    async fn ask(&self, prompt: &str, system: &str) -> Result<String, AiError> {
        let options = self.options.clone().with_system(system);
        tokio::time::timeout(self.timeout, self.backend.complete(prompt, &options))
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
    }

    /// One healer call, followed by at most one stricter regeneration when
    /// the healer answers with analysis instead of code.
    pub async fn heal(&self, request: &HealRequest<'_>) -> Result<HealedScript, HealingError> {
        info!(
            "Healer analysing attempt {} failure (primary type: {})",
            request.attempt,
            request.analysis.primary().as_str()
        );
        let reply = self.ask(&heal_prompt(request), HEALER_SYSTEM).await?;

        if let Some(code) = accept(extract_code(&reply)) {
            return Ok(HealedScript {
                code,
                regenerated: false,
                fixes_applied: request.analysis.fixes_applied(),
            });
        }

        warn!("Healer returned analysis instead of code, requesting regeneration");
        let regenerated = self
            .ask(&regenerate_prompt(request, &reply), GENERATOR_SYSTEM)
            .await?;

        match accept(Some(strip_code_fences(&regenerated))) {
            Some(code) => Ok(HealedScript {
                code,
                regenerated: true,
                fixes_applied: request.analysis.fixes_applied(),
            }),
            None => Err(HealingError::ProtocolFailure {
                last_output: regenerated,
            }),
        }
    }
}

fn heal_prompt(request: &HealRequest<'_>) -> String {
    let analysis = request.analysis;
    let mut details = String::new();
    for (category, lines) in &analysis.lines {
        details.push_str(&format!("- {} ({} lines)\n", category, lines.len()));
        for line in lines.iter().take(5) {
            details.push_str(&format!("    {}\n", line));
        }
    }
    if details.is_empty() {
        details.push_str("- no known failure pattern matched\n");
    }

    format!(
        r#"A Playwright test failed. Fix the test script.

Failure type: {primary}
Attempt: {attempt}

Error output:
{excerpt}

Detected issues:
{details}
Fixes to apply:
{fixes}
Original requirements:
{requirements}

Failing test script:
```javascript
{script}
```

Return JSON: {{"fixedCode": "<the complete corrected test file>"}}"#,
        primary = analysis.primary().as_str(),
        attempt = request.attempt,
        excerpt = error_excerpt(request.output),
        fixes = directive_list(analysis),
        requirements = request.requirements.unwrap_or("(none provided)"),
        script = request.script,
    )
}

fn regenerate_prompt(request: &HealRequest<'_>, analysis_text: &str) -> String {
    format!(
        r#"Based on this test failure analysis, generate a COMPLETE, WORKING Playwright test file.

FAILURE ANALYSIS:
{analysis_text}

ORIGINAL TEST REQUIREMENTS:
{requirements}

CRITICAL FIXES TO APPLY:
{fixes}
REQUIREMENTS:
1. Generate COMPLETE test code (not snippets)
2. Include all imports: const {{ test, expect }} = require('@playwright/test');
3. Include a test.describe() wrapper with test() functions
4. Apply ALL the fixes listed above
5. Return ONLY executable JavaScript code. Do NOT return JSON analysis.

Current test script for reference:
{script}"#,
        requirements = request.requirements.unwrap_or("(none provided)"),
        fixes = directive_list(request.analysis),
        script = request.script,
    )
}

fn directive_list(analysis: &FailureAnalysis) -> String {
    let directives = analysis.fix_directives();
    if directives.is_empty() {
        return "- Use more reliable selectors with proper wait conditions\n".to_string();
    }
    directives.iter().map(|d| format!("- {}\n", d)).collect()
}
