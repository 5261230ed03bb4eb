use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;

static PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) passed").expect("valid passed regex"));
static FAILED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) failed").expect("valid failed regex"));
static SKIPPED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) skipped").expect("valid skipped regex"));
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+(?:\.\d+)?)s\)").expect("valid duration regex"));

/// Pass/fail counts reported by a test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TestTally {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// `passed + failed`; skipped tests are not counted.
    pub total: u32,
    pub duration: Option<Duration>,
}

impl TestTally {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

fn first_count(re: &Regex, output: &str) -> u32 {
    re.captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse the summary line(s) of runner output. Missing counts are zero.
pub fn parse_tally(output: &str) -> TestTally {
    let passed = first_count(&PASSED_RE, output);
    let failed = first_count(&FAILED_RE, output);
    let skipped = first_count(&SKIPPED_RE, output);
    let duration = DURATION_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

    TestTally {
        passed,
        failed,
        skipped,
        total: passed.saturating_add(failed),
        duration,
    }
}
