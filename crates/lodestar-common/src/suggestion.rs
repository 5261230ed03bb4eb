use crate::locator::Locator;
use serde::{Deserialize, Serialize};

/// Structured answer from the AI backend for a lookup or a heal.
///
/// `reasoning` is advisory text only and is never used for control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct AiSuggestion {
    /// Best candidate. Absent when a heal call proposed no selectors at all.
    pub primary: Option<Locator>,
    pub fallbacks: Vec<Locator>,
    pub confidence: f64,
    /// Why the previous locator broke. Only set on heal calls.
    pub diagnosis: Option<String>,
    pub reasoning: Option<String>,
}

impl AiSuggestion {
    /// Candidates in probe order: primary first, then fallbacks as given.
    pub fn candidates(&self) -> impl Iterator<Item = &Locator> {
        self.primary.iter().chain(self.fallbacks.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.fallbacks.is_empty()
    }
}

/// Result of a screenshot-based state check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualVerdict {
    pub matches: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl VisualVerdict {
    /// Low-confidence placeholder used when the provider cannot see images.
    pub fn vision_unavailable() -> Self {
        Self {
            matches: true,
            confidence: 0.5,
            observations: vec![
                "Vision analysis skipped - provider has no vision capability".to_string(),
            ],
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}
