//! Append-only healing history, optionally persisted as a JSON array.

use lodestar_common::{HealingRecord, HealingStatistics, Locator};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Number of recent events listed in a report.
const REPORT_RECENT: usize = 10;
/// Number of repeatedly failing locators listed in a report.
const REPORT_FREQUENT: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct HealingHistory {
    records: Vec<HealingRecord>,
    path: Option<PathBuf>,
}

impl HealingHistory {
    /// In-memory history that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the history stored at `path`. A missing or unreadable file starts
    /// an empty history that will still be saved to `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<Vec<HealingRecord>>(&data) {
                Ok(records) => {
                    info!("Loaded {} healing records", records.len());
                    records
                }
                Err(e) => {
                    error!("Ignoring corrupt healing history {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => {
                info!("Starting with empty healing history");
                Vec::new()
            }
        };
        Self {
            records,
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[HealingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record and persist the history if it has a path.
    pub async fn record(&mut self, record: HealingRecord) {
        info!(
            "Healing recorded: {} -> {}",
            record.element_description,
            record
                .new_locator
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "N/A".to_string())
        );
        self.records.push(record);
        self.save().await;
    }

    /// Write the history to its path. Failures are logged, never raised.
    pub async fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            error!("Failed to save healing history: {}", e);
            return;
        }
        let json = match serde_json::to_string_pretty(&self.records) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to save healing history: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            error!("Failed to save healing history: {}", e);
        }
    }

    /// Most recent successful heal of `old` for this description.
    pub fn find_prior_heal(&self, description: &str, old: &Locator) -> Option<&HealingRecord> {
        let wanted = description.trim().to_lowercase();
        self.records.iter().rev().find(|r| {
            r.success
                && r.new_locator.is_some()
                && r.old_locator.as_ref() == Some(old)
                && r.element_description.trim().to_lowercase() == wanted
        })
    }

    pub fn statistics(&self) -> HealingStatistics {
        HealingStatistics::from_records(&self.records)
    }

    /// Old locators that needed healing most often, most frequent first.
    /// Ties keep the order in which the locator first appeared.
    pub fn frequent_failures(&self, limit: usize) -> Vec<(Locator, usize)> {
        let mut counts: HashMap<&Locator, (usize, usize)> = HashMap::new();
        for (idx, record) in self.records.iter().enumerate() {
            if let Some(old) = &record.old_locator {
                counts.entry(old).or_insert((0, idx)).0 += 1;
            }
        }
        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(locator, (count, _))| (locator.clone(), count))
            .collect()
    }

    /// Markdown summary of the history.
    pub fn render_report(&self) -> String {
        let stats = self.statistics();
        let mut out = String::new();

        let _ = writeln!(out, "# Self-Healing Report\n");
        let _ = writeln!(out, "## Statistics");
        let _ = writeln!(out, "- Total Healing Attempts: {}", stats.total);
        let _ = writeln!(out, "- Successful Healings: {}", stats.successful);
        let _ = writeln!(out, "- Failed Healings: {}", stats.failed);
        let _ = writeln!(out, "- Success Rate: {}\n", stats.success_rate_percent());

        let _ = writeln!(out, "## Healing Strategies Used");
        for (strategy, count) in &stats.strategy_counts {
            let _ = writeln!(out, "- {}: {}", strategy, count);
        }
        out.push('\n');

        let _ = writeln!(out, "## Recent Healing Events");
        for record in self.records.iter().rev().take(REPORT_RECENT) {
            let _ = writeln!(out, "\n### {}", record.element_description);
            let _ = writeln!(
                out,
                "- Test: {}",
                record.test_name.as_deref().unwrap_or("N/A")
            );
            let _ = writeln!(
                out,
                "- Status: {}",
                if record.success { "Success" } else { "Failed" }
            );
            let _ = writeln!(out, "- Old Locator: `{}`", display_or_na(&record.old_locator));
            let _ = writeln!(out, "- New Locator: `{}`", display_or_na(&record.new_locator));
            let _ = writeln!(out, "- Strategy: {}", record.strategy);
            let _ = writeln!(out, "- Confidence: {:.0}%", record.confidence * 100.0);
            let _ = writeln!(out, "- Date: {}", record.timestamp.to_rfc3339());
        }
        out.push('\n');

        let _ = writeln!(out, "## Recommendations");
        let frequent = self.frequent_failures(REPORT_FREQUENT);
        if frequent.is_empty() {
            let _ = writeln!(out, "No recurring locator failures.");
        } else {
            let _ = writeln!(
                out,
                "These locators needed healing most often; consider replacing them with stable test ids:"
            );
            for (locator, count) in frequent {
                let _ = writeln!(out, "- `{}` ({} times)", locator, count);
            }
        }
        out
    }
}

fn display_or_na(locator: &Option<Locator>) -> String {
    locator
        .as_ref()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_common::HealingStrategy;
    use tempfile::tempdir;

    fn healed(desc: &str, old: &str, new: &str) -> HealingRecord {
        HealingRecord::success(
            desc,
            Some(Locator::css(old)),
            Locator::css(new),
            HealingStrategy::AiGenerated,
            0.9,
        )
    }

    #[tokio::test]
    async fn test_find_prior_heal_prefers_most_recent() {
        let mut history = HealingHistory::new();
        history.record(healed("Login Button", "#login", "#login-v1")).await;
        history.record(healed("login button", "#login", "#login-v2")).await;
        history.record(HealingRecord::failure("login button", Some(Locator::css("#login")))).await;

        let prior = history
            .find_prior_heal("LOGIN BUTTON", &Locator::css("#login"))
            .unwrap();
        assert_eq!(prior.new_locator, Some(Locator::css("#login-v2")));
        assert!(history.find_prior_heal("login button", &Locator::css("#other")).is_none());
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("healing-history.json");

        let mut history = HealingHistory::load(&path).await;
        assert!(history.is_empty());
        history.record(healed("search", "#q", "input[name=q]")).await;

        let reloaded = HealingHistory::load(&path).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].element_description, "search");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"healingStrategy\": \"ai-generated\""));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let history = HealingHistory::load(&path).await;
        assert!(history.is_empty());
        assert_eq!(history.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_frequent_failures_ranked() {
        let mut history = HealingHistory::new();
        history.record(healed("a", "#a", "#a2")).await;
        history.record(healed("b", "#b", "#b2")).await;
        history.record(healed("b", "#b", "#b3")).await;

        let frequent = history.frequent_failures(5);
        assert_eq!(frequent[0], (Locator::css("#b"), 2));
        assert_eq!(frequent[1], (Locator::css("#a"), 1));
    }

    #[tokio::test]
    async fn test_report_sections() {
        let mut history = HealingHistory::new();
        assert!(history.render_report().contains("Success Rate: 0%"));

        history.record(healed("a", "#a", "#a2")).await;
        history.record(healed("b", "#b", "#b2")).await;
        history.record(HealingRecord::failure("c", Some(Locator::css("#c")))).await;

        let report = history.render_report();
        assert!(report.contains("- Total Healing Attempts: 3"));
        assert!(report.contains("- Success Rate: 66.67%"));
        assert!(report.contains("- ai-generated: 2"));
        assert!(report.contains("- failed: 1"));
        // Newest first.
        let c = report.find("### c").unwrap();
        let a = report.find("### a").unwrap();
        assert!(c < a);
    }
}
