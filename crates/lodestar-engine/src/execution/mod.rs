//! Execution-level healing: run a test script, classify failures, patch the
//! script through the healer and re-run within a fixed attempt budget.

pub mod classify;
pub mod error;
pub mod heal_loop;
pub mod healer;
pub mod runner;
pub mod tally;

pub use classify::{FailureAnalysis, FailureCategory, PrimaryFailure, classify};
pub use error::{ExecutionError, HealingError};
pub use heal_loop::{ExecutionAttempt, ExecutionJob, ExecutionReport, HealingLoop};
pub use healer::{HealRequest, HealedScript, Healer};
pub use runner::{CommandRunner, ScriptRunner};
pub use tally::{TestTally, parse_tally};
