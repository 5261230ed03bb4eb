use async_trait::async_trait;
use lodestar_common::ProcessOutput;
use lodestar_engine::ai::{AiBackend, AiError, CompletionOptions};
use lodestar_engine::execution::{
    ExecutionError, ExecutionJob, FailureCategory, Healer, HealingError, HealingLoop,
    ScriptRunner,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ORIGINAL: &str = "const { test } = require('@playwright/test');\n\
test('login', async ({ page }) => { await page.locator('button').click(); });";

const HEALED: &str = "const { test } = require('@playwright/test');\n\
test('login', async ({ page }) => { await page.locator('button').first().click(); });";

const STRICT_FAILURE: &str = "Running 3 tests using 1 worker\n\
Error: strict mode violation: locator('button') resolved to 2 elements:\n\
  2 failed\n  1 passed (3.1s)";

/// Replays canned outputs in order, repeating the last one.
struct FakeRunner {
    outputs: Vec<ProcessOutput>,
    seen_scripts: Mutex<Vec<String>>,
}

impl FakeRunner {
    fn new(outputs: Vec<ProcessOutput>) -> Self {
        Self {
            outputs,
            seen_scripts: Mutex::new(Vec::new()),
        }
    }

    fn runs(&self) -> usize {
        self.seen_scripts.lock().unwrap().len()
    }
}

#[async_trait]
impl ScriptRunner for FakeRunner {
    async fn run(&self, script: &Path) -> Result<ProcessOutput, ExecutionError> {
        let body = tokio::fs::read_to_string(script).await?;
        let mut seen = self.seen_scripts.lock().unwrap();
        let idx = seen.len().min(self.outputs.len() - 1);
        seen.push(body);
        Ok(self.outputs[idx].clone())
    }
}

/// Replays canned replies in order, repeating the last one.
struct FakeHealerAi {
    replies: Vec<Result<String, AiError>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeHealerAi {
    fn new(replies: Vec<Result<String, AiError>>) -> Arc<Self> {
        Arc::new(Self {
            replies,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl AiBackend for FakeHealerAi {
    fn provider(&self) -> &str {
        "fake"
    }

    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String, AiError> {
        let mut prompts = self.prompts.lock().unwrap();
        let idx = prompts.len().min(self.replies.len() - 1);
        prompts.push(prompt.to_string());
        self.replies[idx].clone()
    }
}

fn failing(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(1),
    }
}

fn passing(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

fn fixed_code(code: &str) -> Result<String, AiError> {
    Ok(serde_json::json!({ "fixedCode": code }).to_string())
}

fn analysis_only() -> Result<String, AiError> {
    Ok(r#"{"rootCause": "multiple buttons", "fixes": [{"type": "selector"}]}"#.to_string())
}

fn script_file() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("login.spec.js");
    std::fs::write(&path, ORIGINAL).unwrap();
    (dir, path)
}

#[tokio::test]
async fn test_strict_mode_failure_healed_then_passes() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![
        failing(STRICT_FAILURE),
        passing("  3 passed (2.0s)"),
    ]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let job = ExecutionJob::new(&path).with_requirements("User can log in");
    let report = heal_loop.run(&job).await.unwrap();

    assert_eq!(report.attempt_count(), 2);
    assert!(report.healing_applied);
    assert_eq!(
        report.attempts[0].categories,
        vec![FailureCategory::StrictModeViolation]
    );
    assert_eq!(report.attempts[0].tally.failed, 2);
    assert!(!report.attempts[0].healed_before);
    assert!(report.attempts[1].healed_before);
    assert!(report
        .fixes_applied
        .contains(&"Added .first() to multi-match locators".to_string()));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), HEALED);
    assert_eq!(heal_loop.runner().seen_scripts.lock().unwrap()[1], HEALED);
    assert_eq!(ai.calls(), 1);

    let prompt = ai.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("strict-mode-violation"));
    assert!(prompt.contains("Add .first()"));
    assert!(prompt.contains("User can log in"));
}

#[tokio::test]
async fn test_passing_first_run_never_heals() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![passing("  3 passed (1.0s)")]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let report = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap();

    assert_eq!(report.attempt_count(), 1);
    assert!(!report.healing_applied);
    assert_eq!(ai.calls(), 0);
}

#[tokio::test]
async fn test_attempts_are_bounded() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![failing(STRICT_FAILURE)]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop =
        HealingLoop::new(runner, Healer::new(ai.clone())).with_max_attempts(3);
    assert_eq!(heal_loop.max_attempts(), 3);

    let err = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap_err();

    match err {
        ExecutionError::Failed {
            attempts,
            failed,
            total,
            categories,
            report,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!((failed, total), (2, 3));
            assert_eq!(categories, vec![FailureCategory::StrictModeViolation]);
            assert!(report.healing_applied);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(heal_loop.runner().runs(), 3);
    assert_eq!(ai.calls(), 2);
}

#[tokio::test]
async fn test_default_budget_is_two_runs() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![failing("  1 failed (0.5s)")]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let err = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap_err();

    assert!(matches!(err, ExecutionError::Failed { attempts: 2, .. }));
    assert_eq!(heal_loop.runner().runs(), 2);
}

#[tokio::test]
async fn test_zero_budget_still_runs_once() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![failing("  1 failed (0.5s)")]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone())).with_max_attempts(0);
    assert_eq!(heal_loop.max_attempts(), 1);

    let err = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap_err();

    assert!(matches!(err, ExecutionError::Failed { attempts: 1, .. }));
    assert_eq!(ai.calls(), 0);
}

#[tokio::test]
async fn test_nonzero_exit_without_tally_counts_as_failure() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![
        failing("Error: Cannot find module '@playwright/test'"),
        passing("  1 passed (0.4s)"),
    ]);
    let ai = FakeHealerAi::new(vec![fixed_code(HEALED)]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let report = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap();

    assert_eq!(report.attempt_count(), 2);
    assert!(report.attempts[0].categories.is_empty());
}

#[tokio::test]
async fn test_analysis_reply_triggers_one_regeneration() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![
        failing(STRICT_FAILURE),
        passing("  3 passed (2.0s)"),
    ]);
    let ai = FakeHealerAi::new(vec![analysis_only(), Ok(format!("```javascript\n{}\n```", HEALED))]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let report = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap();

    assert!(report.healing_applied);
    assert_eq!(ai.calls(), 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), HEALED);
    let regenerate = ai.prompts.lock().unwrap()[1].clone();
    assert!(regenerate.contains("Do NOT return JSON analysis"));
    assert!(regenerate.contains("rootCause"));
}

#[tokio::test]
async fn test_persistent_analysis_is_protocol_failure() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![failing(STRICT_FAILURE)]);
    let ai = FakeHealerAi::new(vec![analysis_only()]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let err = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap_err();

    match err {
        ExecutionError::HealingProtocolFailure {
            attempt,
            last_output,
            report,
        } => {
            assert_eq!(attempt, 1);
            assert!(last_output.contains("rootCause"));
            assert_eq!(report.attempt_count(), 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ai.calls(), 2);
    assert_eq!(heal_loop.runner().runs(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), ORIGINAL);
}

#[tokio::test]
async fn test_healer_outage_is_healing_failure() {
    let (_dir, path) = script_file();
    let runner = FakeRunner::new(vec![failing(STRICT_FAILURE)]);
    let ai = FakeHealerAi::new(vec![Err(AiError::Unavailable("HTTP 503".into()))]);
    let heal_loop = HealingLoop::new(runner, Healer::new(ai.clone()));

    let err = heal_loop.run(&ExecutionJob::new(&path)).await.unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::HealingFailed {
            attempt: 1,
            source: HealingError::Ai(AiError::Unavailable(_)),
            ..
        }
    ));
    assert_eq!(ai.calls(), 1);
    assert_eq!(heal_loop.runner().runs(), 1);
}
