use super::classify::FailureCategory;
use super::heal_loop::ExecutionReport;
use crate::ai::AiError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HealingError {
    #[error("Healer AI call failed: {0}")]
    Ai(#[from] AiError),

    /// The healer kept answering with analysis instead of runnable code.
    #[error("Healer returned analysis instead of runnable code after a stricter retry")]
    ProtocolFailure { last_output: String },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Tests still failed when the attempt budget ran out.
    #[error("Tests failed after {attempts} attempts: {failed}/{total} failed")]
    Failed {
        attempts: u32,
        failed: u32,
        total: u32,
        categories: Vec<FailureCategory>,
        report: Box<ExecutionReport>,
    },

    #[error("Self-healing failed before attempt {}: {source}", .attempt + 1)]
    HealingFailed {
        attempt: u32,
        source: HealingError,
        report: Box<ExecutionReport>,
    },

    #[error("Healer persistently returned analysis instead of code (attempt {attempt})")]
    HealingProtocolFailure {
        attempt: u32,
        /// The healer's final reply.
        last_output: String,
        report: Box<ExecutionReport>,
    },

    #[error("Runner error: {0}")]
    Runner(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Report of the attempts made before the error, when any ran.
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            ExecutionError::Failed { report, .. }
            | ExecutionError::HealingFailed { report, .. }
            | ExecutionError::HealingProtocolFailure { report, .. } => Some(report),
            ExecutionError::Runner(_) | ExecutionError::Io(_) => None,
        }
    }
}
