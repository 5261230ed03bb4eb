//! Deterministic locator strategies.
//!
//! Each strategy turns a natural-language description into zero or more
//! candidate locators without consulting the AI backend. The pipeline tries
//! strategies in a fixed order and stops at the first visible match.

use crate::driver::Driver;
use crate::probe::probe;
use lodestar_common::{ElementHandle, Locator};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// Role keywords recognised in descriptions, in the order they are tried.
pub const ROLE_KEYWORDS: [&str; 6] = ["button", "link", "textbox", "checkbox", "radio", "combobox"];

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']+)'|"([^"]+)""#).expect("valid quoted-text regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Text,
    Role,
    Placeholder,
    Label,
    TestId,
}

impl Strategy {
    /// Standard priority order.
    pub const ORDERED: [Strategy; 5] = [
        Strategy::Text,
        Strategy::Role,
        Strategy::Placeholder,
        Strategy::Label,
        Strategy::TestId,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Text => "by-text",
            Strategy::Role => "by-role",
            Strategy::Placeholder => "by-placeholder",
            Strategy::Label => "by-label",
            Strategy::TestId => "by-test-id",
        }
    }

    /// Candidate locators for `description`, in the order they should be probed.
    pub fn candidates(&self, description: &str) -> Vec<Locator> {
        let description = description.trim();
        if description.is_empty() {
            return Vec::new();
        }
        match self {
            Strategy::Text => {
                let search = extract_quoted(description).unwrap_or(description);
                vec![Locator::text(search)]
            }
            Strategy::Role => {
                let lower = description.to_lowercase();
                ROLE_KEYWORDS
                    .iter()
                    .filter(|role| lower.contains(*role))
                    .map(|role| Locator::role(*role))
                    .collect()
            }
            Strategy::Placeholder => {
                if description.to_lowercase().contains("placeholder") {
                    vec![Locator::placeholder(description)]
                } else {
                    Vec::new()
                }
            }
            Strategy::Label => vec![Locator::label(description)],
            Strategy::TestId => test_id_candidates(description)
                .into_iter()
                .map(Locator::test_id)
                .collect(),
        }
    }
}

/// First single- or double-quoted substring of the description, if any.
pub fn extract_quoted(description: &str) -> Option<&str> {
    let caps = QUOTED_RE.captures(description)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Test-id spellings derived from a description: hyphen-case, snake_case and
/// whitespace-stripped concatenation. Duplicates are dropped.
pub fn test_id_candidates(description: &str) -> Vec<String> {
    let trimmed = description.trim();
    let lower = trimmed.to_lowercase();
    let spellings = [
        WHITESPACE_RE.replace_all(&lower, "-").into_owned(),
        WHITESPACE_RE.replace_all(&lower, "_").into_owned(),
        WHITESPACE_RE.replace_all(trimmed, "").into_owned(),
    ];

    let mut out: Vec<String> = Vec::with_capacity(spellings.len());
    for s in spellings {
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

/// A strategy match.
#[derive(Debug, Clone)]
pub struct StrategyMatch {
    pub strategy: Strategy,
    pub element: ElementHandle,
}

/// Outcome of running the whole pipeline.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Matched(StrategyMatch),
    /// Nothing matched. `tried` lists every candidate probed, in order.
    Exhausted { tried: Vec<Locator> },
}

#[derive(Debug, Clone)]
pub struct StrategyPipeline {
    strategies: Vec<Strategy>,
}

impl Default for StrategyPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl StrategyPipeline {
    pub fn standard() -> Self {
        Self {
            strategies: Strategy::ORDERED.to_vec(),
        }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Run strategies in order; the first visible match wins.
    pub async fn resolve<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        description: &str,
        timeout: Duration,
    ) -> PipelineOutcome {
        let mut tried = Vec::new();
        for strategy in &self.strategies {
            for candidate in strategy.candidates(description) {
                debug!("Trying {} candidate {}", strategy.name(), candidate);
                let result = probe(driver, &candidate, timeout).await;
                tried.push(candidate);
                if let Some(element) = result.found() {
                    info!(
                        "Element '{}' found using {} strategy: {}",
                        description,
                        strategy.name(),
                        element.locator
                    );
                    return PipelineOutcome::Matched(StrategyMatch {
                        strategy: *strategy,
                        element,
                    });
                }
            }
        }
        PipelineOutcome::Exhausted { tried }
    }
}
