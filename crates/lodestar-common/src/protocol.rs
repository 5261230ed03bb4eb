use crate::locator::Locator;
use serde::{Deserialize, Serialize};

/// A live element matched by a probe.
///
/// Handles are snapshots: they identify the element through the locator that
/// matched it rather than a driver-side reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    pub locator: Locator,
    /// Number of visible elements the locator matched. The handle refers to the first.
    pub match_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementHandle {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            match_count: 1,
            tag: None,
            text: None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.match_count > 1
    }
}

/// Outcome of probing one locator. Absence is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Found(ElementHandle),
    NotFound,
}

impl ProbeResult {
    pub fn found(self) -> Option<ElementHandle> {
        match self {
            ProbeResult::Found(handle) => Some(handle),
            ProbeResult::NotFound => None,
        }
    }
}

/// When a navigation is considered complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16,
}

/// Captured result of an out-of-process test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
}

