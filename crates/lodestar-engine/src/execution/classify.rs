//! Heuristic classification of test-runner failure output.
//!
//! Categories are independent: a single run may match several. Output that
//! matches nothing is still a failure; it just carries no category.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static SELECTOR_TIMEOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Timeout.*waiting for (selector|locator)").expect("valid selector-timeout regex")
});

static SELECTOR_NOT_FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)locator\('([^']+)'\).*not found").expect("valid selector-not-found regex")
});

static TEXT_MISMATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expected.*to contain.*but received").expect("valid text-mismatch regex")
});

static NAVIGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Navigation|net::ERR_|timeout.*navigation|Timeout.*goto)")
        .expect("valid navigation regex")
});

static STRICT_MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)strict mode violation.*resolved to (\d+) elements")
        .expect("valid strict-mode regex")
});

static STYLE_ASSERTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)toHaveCSS|font-size|font-family").expect("valid style-assertion regex")
});

/// Maximum characters of raw output forwarded to the healer as the error message.
pub const ERROR_MESSAGE_BUDGET: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    SelectorTimeout,
    SelectorNotFound,
    StrictModeViolation,
    TextMismatch,
    NavigationTimeout,
    StyleAssertionMismatch,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::SelectorTimeout => "selector-timeout",
            FailureCategory::SelectorNotFound => "selector-not-found",
            FailureCategory::StrictModeViolation => "strict-mode-violation",
            FailureCategory::TextMismatch => "text-mismatch",
            FailureCategory::NavigationTimeout => "navigation-timeout",
            FailureCategory::StyleAssertionMismatch => "style-assertion-mismatch",
        }
    }

    /// Instruction given to the healer when this category was detected.
    pub fn fix_directive(&self) -> &'static str {
        match self {
            FailureCategory::StrictModeViolation => {
                "Add .first() to all multi-match locators to handle strict mode violations"
            }
            FailureCategory::NavigationTimeout => "Increase navigation timeout to 30000ms",
            FailureCategory::StyleAssertionMismatch => {
                "Remove CSS exact value assertions, use visibility/existence checks instead"
            }
            FailureCategory::SelectorTimeout | FailureCategory::SelectorNotFound => {
                "Use more reliable selectors with proper wait conditions"
            }
            FailureCategory::TextMismatch => {
                "Use flexible text matching (contains, not exact match)"
            }
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant failure type passed to the healer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryFailure {
    StrictModeViolation,
    NavigationTimeout,
    SelectorNotFound,
    CssAssertion,
    Unknown,
}

impl PrimaryFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryFailure::StrictModeViolation => "strict-mode-violation",
            PrimaryFailure::NavigationTimeout => "navigation-timeout",
            PrimaryFailure::SelectorNotFound => "selector-not-found",
            PrimaryFailure::CssAssertion => "css-assertion",
            PrimaryFailure::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureAnalysis {
    /// Matching output lines per category. Navigation is matched over the
    /// whole output and records no lines.
    pub lines: BTreeMap<FailureCategory, Vec<String>>,
    /// Element counts reported by strict-mode violations, in output order.
    pub strict_match_counts: Vec<usize>,
}

impl FailureAnalysis {
    pub fn categories(&self) -> Vec<FailureCategory> {
        self.lines.keys().copied().collect()
    }

    pub fn has(&self, category: FailureCategory) -> bool {
        self.lines.contains_key(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn has_selector_issue(&self) -> bool {
        self.has(FailureCategory::SelectorTimeout) || self.has(FailureCategory::SelectorNotFound)
    }

    pub fn primary(&self) -> PrimaryFailure {
        if self.has(FailureCategory::StrictModeViolation) {
            PrimaryFailure::StrictModeViolation
        } else if self.has(FailureCategory::NavigationTimeout) {
            PrimaryFailure::NavigationTimeout
        } else if self.has_selector_issue() {
            PrimaryFailure::SelectorNotFound
        } else if self.has(FailureCategory::StyleAssertionMismatch) {
            PrimaryFailure::CssAssertion
        } else {
            PrimaryFailure::Unknown
        }
    }

    /// One directive per detected concern, deduplicated, in fixed order.
    pub fn fix_directives(&self) -> Vec<&'static str> {
        const ORDER: [FailureCategory; 6] = [
            FailureCategory::StrictModeViolation,
            FailureCategory::NavigationTimeout,
            FailureCategory::StyleAssertionMismatch,
            FailureCategory::SelectorTimeout,
            FailureCategory::SelectorNotFound,
            FailureCategory::TextMismatch,
        ];
        let mut out: Vec<&'static str> = Vec::new();
        for category in ORDER {
            let directive = category.fix_directive();
            if self.has(category) && !out.contains(&directive) {
                out.push(directive);
            }
        }
        out
    }

    /// Human-readable summary of fixes a heal applies for this analysis.
    pub fn fixes_applied(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.has(FailureCategory::StrictModeViolation) {
            out.push("Added .first() to multi-match locators".to_string());
        }
        if self.has(FailureCategory::NavigationTimeout) {
            out.push("Increased navigation timeout to 30000ms".to_string());
        }
        if self.has(FailureCategory::StyleAssertionMismatch) {
            out.push("Removed CSS exact value assertions".to_string());
        }
        if self.has_selector_issue() {
            out.push("Improved selector reliability".to_string());
        }
        out
    }
}

/// Classify raw runner output.
pub fn classify(output: &str) -> FailureAnalysis {
    let mut analysis = FailureAnalysis::default();

    if NAVIGATION_RE.is_match(output) {
        analysis
            .lines
            .insert(FailureCategory::NavigationTimeout, Vec::new());
    }

    for line in output.lines() {
        let trimmed = line.trim();
        let mut push = |category| {
            analysis
                .lines
                .entry(category)
                .or_default()
                .push(trimmed.to_string());
        };

        if SELECTOR_TIMEOUT_RE.is_match(line) {
            push(FailureCategory::SelectorTimeout);
        }
        if SELECTOR_NOT_FOUND_RE.is_match(line) {
            push(FailureCategory::SelectorNotFound);
        }
        if TEXT_MISMATCH_RE.is_match(line) {
            push(FailureCategory::TextMismatch);
        }
        if STYLE_ASSERTION_RE.is_match(line) {
            push(FailureCategory::StyleAssertionMismatch);
        }
        if let Some(caps) = STRICT_MODE_RE.captures(line) {
            push(FailureCategory::StrictModeViolation);
            if let Some(count) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                analysis.strict_match_counts.push(count);
            }
        }
    }
    analysis
}

/// Leading excerpt of the output, cut on a character boundary.
pub fn error_excerpt(output: &str) -> &str {
    match output.char_indices().nth(ERROR_MESSAGE_BUDGET) {
        Some((idx, _)) => &output[..idx],
        None => output,
    }
}
