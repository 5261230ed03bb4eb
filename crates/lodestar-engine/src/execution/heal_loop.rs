//! Bounded run/classify/heal loop over a test script.

use super::classify::{FailureCategory, classify};
use super::error::{ExecutionError, HealingError};
use super::healer::{HealRequest, Healer};
use super::runner::ScriptRunner;
use super::tally::{TestTally, parse_tally};
use lodestar_common::ProcessOutput;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// A script to run, plus the requirements it was written from.
#[derive(Debug, Clone)]
pub struct ExecutionJob {
    pub script_path: PathBuf,
    pub requirements: Option<String>,
}

impl ExecutionJob {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            requirements: None,
        }
    }

    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = Some(requirements.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAttempt {
    /// One-based attempt number.
    pub number: u32,
    pub tally: TestTally,
    /// Raw runner output (stdout followed by stderr).
    pub output: String,
    pub exit_code: Option<i32>,
    /// Whether a healing pass rewrote the script before this attempt.
    pub healed_before: bool,
    pub categories: Vec<FailureCategory>,
}

impl ExecutionAttempt {
    pub fn failed(&self) -> bool {
        !self.tally.all_passed() || self.exit_code != Some(0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub attempts: Vec<ExecutionAttempt>,
    pub healing_applied: bool,
    pub fixes_applied: Vec<String>,
}

impl ExecutionReport {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn last(&self) -> Option<&ExecutionAttempt> {
        self.attempts.last()
    }
}

fn combined_output(output: &ProcessOutput) -> String {
    match (output.stdout.trim().is_empty(), output.stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", output.stdout, output.stderr),
        (true, _) => output.stderr.clone(),
        (false, true) => output.stdout.clone(),
    }
}

pub struct HealingLoop<R: ScriptRunner> {
    runner: R,
    healer: Healer,
    max_attempts: u32,
}

impl<R: ScriptRunner> HealingLoop<R> {
    pub fn new(runner: R, healer: Healer) -> Self {
        Self {
            runner,
            healer,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Attempt budget, clamped to at least one run.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run the job until it passes or the attempt budget is spent.
    ///
    /// The script file is overwritten with healed code between attempts.
    pub async fn run(&self, job: &ExecutionJob) -> Result<ExecutionReport, ExecutionError> {
        let mut report = ExecutionReport::default();
        let mut healed_before = false;

        for number in 1..=self.max_attempts {
            info!(
                "Attempt {}/{}: running {}",
                number,
                self.max_attempts,
                job.script_path.display()
            );
            let output = self.runner.run(&job.script_path).await?;
            let raw = combined_output(&output);
            let tally = parse_tally(&raw);
            let analysis = classify(&raw);

            let attempt = ExecutionAttempt {
                number,
                tally,
                output: raw,
                exit_code: output.exit_code,
                healed_before,
                categories: analysis.categories(),
            };
            let failed = attempt.failed();
            report.attempts.push(attempt);

            if !failed {
                info!(
                    "Attempt {} passed: {}/{} tests",
                    number, tally.passed, tally.total
                );
                return Ok(report);
            }

            warn!(
                "Attempt {} failed: {}/{} tests failed ({})",
                number,
                tally.failed,
                tally.total,
                category_list(&analysis.categories())
            );

            if number >= self.max_attempts {
                break;
            }

            let script = tokio::fs::read_to_string(&job.script_path).await?;
            let raw_output = report
                .last()
                .map(|a| a.output.as_str())
                .unwrap_or_default();
            let request = HealRequest {
                script: &script,
                output: raw_output,
                analysis: &analysis,
                requirements: job.requirements.as_deref(),
                attempt: number,
            };

            let healed = self.healer.heal(&request).await;
            match healed {
                Ok(healed) => {
                    tokio::fs::write(&job.script_path, &healed.code).await?;
                    info!(
                        "Applied healed script to {} (regenerated: {})",
                        job.script_path.display(),
                        healed.regenerated
                    );
                    report.healing_applied = true;
                    for fix in healed.fixes_applied {
                        if !report.fixes_applied.contains(&fix) {
                            report.fixes_applied.push(fix);
                        }
                    }
                    healed_before = true;
                }
                Err(HealingError::ProtocolFailure { last_output }) => {
                    error!("Healer returned no runnable code after a stricter retry");
                    return Err(ExecutionError::HealingProtocolFailure {
                        attempt: number,
                        last_output,
                        report: Box::new(report),
                    });
                }
                Err(e) => {
                    error!("Self-healing failed: {}", e);
                    return Err(ExecutionError::HealingFailed {
                        attempt: number,
                        source: e,
                        report: Box::new(report),
                    });
                }
            }
        }

        let (failed, total, categories) = report
            .last()
            .map(|a| (a.tally.failed, a.tally.total, a.categories.clone()))
            .unwrap_or_default();
        Err(ExecutionError::Failed {
            attempts: report.attempt_count(),
            failed,
            total,
            categories,
            report: Box::new(report),
        })
    }
}

fn category_list(categories: &[FailureCategory]) -> String {
    if categories.is_empty() {
        return "unclassified".to_string();
    }
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
