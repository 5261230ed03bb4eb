use crate::locator::Locator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a healing record's new locator was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealingStrategy {
    #[serde(rename = "history-based")]
    HistoryBased,
    #[serde(rename = "ai-generated")]
    AiGenerated,
    #[serde(rename = "failed")]
    Failed,
}

impl HealingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingStrategy::HistoryBased => "history-based",
            HealingStrategy::AiGenerated => "ai-generated",
            HealingStrategy::Failed => "failed",
        }
    }
}

impl fmt::Display for HealingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only history entry describing one healing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    pub element_description: String,
    pub old_locator: Option<Locator>,
    pub new_locator: Option<Locator>,
    #[serde(rename = "healingStrategy")]
    pub strategy: HealingStrategy,
    pub success: bool,
    pub confidence: f64,
}

impl HealingRecord {
    pub fn success(
        description: &str,
        old_locator: Option<Locator>,
        new_locator: Locator,
        strategy: HealingStrategy,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            test_name: None,
            element_description: description.to_string(),
            old_locator,
            new_locator: Some(new_locator),
            strategy,
            success: true,
            confidence,
        }
    }

    pub fn failure(description: &str, old_locator: Option<Locator>) -> Self {
        Self {
            timestamp: Utc::now(),
            test_name: None,
            element_description: description.to_string(),
            old_locator,
            new_locator: None,
            strategy: HealingStrategy::Failed,
            success: false,
            confidence: 0.0,
        }
    }

    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }
}

/// Read-only summary over a healing history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingStatistics {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Fraction of successful records in `0.0..=1.0`.
    pub success_rate: f64,
    pub strategy_counts: BTreeMap<HealingStrategy, usize>,
}

impl HealingStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HealingRecord>) -> Self {
        let mut stats = HealingStatistics::default();
        for record in records {
            stats.total += 1;
            if record.success {
                stats.successful += 1;
            }
            *stats.strategy_counts.entry(record.strategy).or_default() += 1;
        }
        stats.failed = stats.total - stats.successful;
        if stats.total > 0 {
            stats.success_rate = stats.successful as f64 / stats.total as f64;
        }
        stats
    }

    /// Success rate formatted as a percentage, e.g. `"66.67%"`, or `"0%"` when empty.
    pub fn success_rate_percent(&self) -> String {
        if self.total == 0 {
            "0%".to_string()
        } else {
            format!("{:.2}%", self.success_rate * 100.0)
        }
    }
}
