use super::strategy::Strategy;
use crate::ai::AiError;
use crate::probe::DEFAULT_FIND_TIMEOUT;
use lodestar_common::{ElementHandle, Locator};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Per-call resolution switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub timeout: Duration,
    pub enable_ai: bool,
    pub enable_self_healing: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FIND_TIMEOUT,
            enable_ai: true,
            enable_self_healing: true,
        }
    }
}

impl ResolveOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_ai(mut self) -> Self {
        self.enable_ai = false;
        self
    }

    pub fn without_self_healing(mut self) -> Self {
        self.enable_self_healing = false;
        self
    }
}

/// Which stage of the resolver produced the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Strategy(Strategy),
    AiPrimary,
    /// Zero-based index into the suggestion's fallback list.
    AiFallback { index: usize },
    HistoryHeal,
    AiHeal,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Cache => f.write_str("cache"),
            ResolutionSource::Strategy(s) => f.write_str(s.name()),
            ResolutionSource::AiPrimary => f.write_str("ai-primary"),
            ResolutionSource::AiFallback { index } => write!(f, "ai-fallback[{}]", index),
            ResolutionSource::HistoryHeal => f.write_str("history-heal"),
            ResolutionSource::AiHeal => f.write_str("ai-heal"),
        }
    }
}

/// A successfully resolved element.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub element: ElementHandle,
    /// Locator that resolved, now held in the cache.
    pub locator: Locator,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Every avenue was exhausted.
    #[error("Could not resolve element '{description}': {}", describe_failure(.attempted, .ai_failure))]
    ElementNotResolvable {
        description: String,
        /// Stages attempted, in order (e.g. `cache`, `by-text`, `ai-suggest`).
        attempted: Vec<String>,
        last_locator: Option<Locator>,
        /// Set when an AI call failed rather than returning nothing useful.
        ai_failure: Option<AiError>,
    },
}

impl ResolveError {
    pub fn description(&self) -> &str {
        match self {
            ResolveError::ElementNotResolvable { description, .. } => description,
        }
    }

    pub fn attempted(&self) -> &[String] {
        match self {
            ResolveError::ElementNotResolvable { attempted, .. } => attempted,
        }
    }

    pub fn ai_failure(&self) -> Option<&AiError> {
        match self {
            ResolveError::ElementNotResolvable { ai_failure, .. } => ai_failure.as_ref(),
        }
    }
}

fn describe_failure(attempted: &[String], ai_failure: &Option<AiError>) -> String {
    let tried = if attempted.is_empty() {
        "nothing attempted".to_string()
    } else {
        format!("tried {}", attempted.join(", "))
    };
    match ai_failure {
        Some(err) => format!("{}; AI assistance failed: {}", tried, err),
        None => format!("{}; nothing matched", tried),
    }
}
