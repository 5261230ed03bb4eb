//! Self-healing resolver.
//!
//! Stages run in a fixed order and the first visible match wins:
//! cache lookup, deterministic strategies, AI primary, AI fallbacks, then
//! self-healing (history fast path, AI heal) when a cached locator was evicted
//! during this resolution.

use super::cache::ResolutionCache;
use super::result::{Resolution, ResolutionSource, ResolveError, ResolveOptions};
use super::strategy::{PipelineOutcome, StrategyPipeline};
use crate::ai::{AiError, SuggestionAdapter};
use crate::config::schema::ResolverConfig;
use crate::driver::Driver;
use crate::history::HealingHistory;
use crate::probe::{HEALING_PROBE_TIMEOUT, probe};
use lodestar_common::{
    AiSuggestion, ElementHandle, HealingRecord, HealingStatistics, HealingStrategy, Locator,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Confidence recorded for a heal replayed from history.
const HISTORY_HEAL_CONFIDENCE: f64 = 0.8;

/// What was tried so far, reported on exhaustion.
#[derive(Debug, Default)]
struct Trail {
    attempted: Vec<String>,
    last_locator: Option<Locator>,
    ai_failure: Option<AiError>,
}

impl Trail {
    fn stage(&mut self, name: &str) {
        self.attempted.push(name.to_string());
    }

    fn probed(&mut self, locator: &Locator) {
        self.last_locator = Some(locator.clone());
    }

    fn into_error(self, description: &str) -> ResolveError {
        ResolveError::ElementNotResolvable {
            description: description.to_string(),
            attempted: self.attempted,
            last_locator: self.last_locator,
            ai_failure: self.ai_failure,
        }
    }
}

pub struct Resolver<D: Driver> {
    driver: D,
    pipeline: StrategyPipeline,
    adapter: Option<SuggestionAdapter>,
    cache: ResolutionCache,
    history: HealingHistory,
    healing_timeout: Duration,
    defaults: ResolveOptions,
    test_name: Option<String>,
}

impl<D: Driver> Resolver<D> {
    /// Resolver with the standard pipeline, no AI and an in-memory history.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            pipeline: StrategyPipeline::standard(),
            adapter: None,
            cache: ResolutionCache::new(),
            history: HealingHistory::new(),
            healing_timeout: HEALING_PROBE_TIMEOUT,
            defaults: ResolveOptions::default(),
            test_name: None,
        }
    }

    pub fn from_config(driver: D, config: &ResolverConfig) -> Self {
        Self::new(driver)
            .with_healing_timeout(config.healing_timeout())
            .with_defaults(ResolveOptions {
                timeout: config.find_timeout(),
                enable_ai: config.enable_ai,
                enable_self_healing: config.enable_self_healing,
            })
    }

    pub fn with_adapter(mut self, adapter: SuggestionAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_history(mut self, history: HealingHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_healing_timeout(mut self, timeout: Duration) -> Self {
        self.healing_timeout = timeout;
        self
    }

    pub fn with_defaults(mut self, defaults: ResolveOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Tag subsequent healing records with a test name.
    pub fn set_test_name(&mut self, name: Option<String>) {
        self.test_name = name;
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResolutionCache {
        &mut self.cache
    }

    pub fn history(&self) -> &HealingHistory {
        &self.history
    }

    pub fn clear_cache(&mut self) {
        info!("Clearing resolution cache ({} entries)", self.cache.len());
        self.cache.clear();
    }

    pub fn healing_statistics(&self) -> HealingStatistics {
        self.history.statistics()
    }

    /// Resolve with the resolver's default options.
    pub async fn resolve(&mut self, description: &str) -> Result<Resolution, ResolveError> {
        let options = self.defaults;
        self.resolve_with(description, options).await
    }

    pub async fn resolve_with(
        &mut self,
        description: &str,
        options: ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let mut trail = Trail::default();

        // CacheLookup
        let mut evicted = None;
        if let Some(cached) = self.cache.get(description).cloned() {
            trail.stage("cache");
            trail.probed(&cached);
            if let Some(element) = probe(&mut self.driver, &cached, options.timeout).await.found() {
                info!("Cache hit for '{}': {}", description, cached);
                return Ok(Resolution {
                    element,
                    locator: cached,
                    source: ResolutionSource::Cache,
                });
            }
            warn!(
                "Cached locator {} for '{}' no longer resolves, evicting",
                cached, description
            );
            self.cache.evict(description);
            evicted = Some(cached);
        } else {
            debug!("Cache miss for '{}'", description);
        }

        // StandardStrategies
        for strategy in self.pipeline.strategies() {
            trail.stage(strategy.name());
        }
        match self
            .pipeline
            .resolve(&mut self.driver, description, options.timeout)
            .await
        {
            PipelineOutcome::Matched(m) => {
                let locator = m.element.locator.clone();
                self.cache.put(description, locator.clone());
                return Ok(Resolution {
                    element: m.element,
                    locator,
                    source: ResolutionSource::Strategy(m.strategy),
                });
            }
            PipelineOutcome::Exhausted { tried } => {
                debug!(
                    "Deterministic strategies exhausted for '{}' ({} candidates)",
                    description,
                    tried.len()
                );
                if let Some(last) = tried.last() {
                    trail.probed(last);
                }
            }
        }

        // AIPrimary / AIFallback
        if options.enable_ai
            && let Some(adapter) = self.adapter.clone()
        {
            trail.stage("ai-suggest");
            if let Some(markup) = self.page_markup(options.timeout).await {
                match adapter.suggest(&markup, description).await {
                    Ok(suggestion) => {
                        if let Some((index, element)) = self
                            .first_visible(&suggestion, options.timeout, &mut trail)
                            .await
                        {
                            let source = if index == 0 {
                                ResolutionSource::AiPrimary
                            } else {
                                ResolutionSource::AiFallback { index: index - 1 }
                            };
                            return Ok(self
                                .accept_heal(
                                    description,
                                    evicted,
                                    element,
                                    source,
                                    HealingStrategy::AiGenerated,
                                    suggestion.confidence,
                                )
                                .await);
                        }
                        info!("No AI suggestion for '{}' resolved", description);
                    }
                    Err(e) => {
                        warn!("AI suggestion failed for '{}': {}", description, e);
                        trail.ai_failure = Some(e);
                    }
                }
            }
        }

        // SelfHeal
        if options.enable_self_healing
            && let Some(old) = evicted.clone()
        {
            if let Some(prior) = self
                .history
                .find_prior_heal(description, &old)
                .and_then(|r| r.new_locator.clone())
            {
                trail.stage("history");
                trail.probed(&prior);
                info!("Trying history-based heal for '{}': {}", description, prior);
                if let Some(element) = probe(&mut self.driver, &prior, self.healing_timeout)
                    .await
                    .found()
                {
                    return Ok(self
                        .accept_heal(
                            description,
                            evicted,
                            element,
                            ResolutionSource::HistoryHeal,
                            HealingStrategy::HistoryBased,
                            HISTORY_HEAL_CONFIDENCE,
                        )
                        .await);
                }
            }

            if options.enable_ai
                && let Some(adapter) = self.adapter.clone()
            {
                trail.stage("ai-heal");
                if let Some(markup) = self.page_markup(options.timeout).await {
                    match adapter.heal(&markup, &old, description).await {
                        Ok(suggestion) => {
                            if let Some(d) = &suggestion.diagnosis {
                                info!("AI diagnosis for {}: {}", old, d);
                            }
                            let timeout = self.healing_timeout;
                            if let Some((_, element)) =
                                self.first_visible(&suggestion, timeout, &mut trail).await
                            {
                                return Ok(self
                                    .accept_heal(
                                        description,
                                        evicted,
                                        element,
                                        ResolutionSource::AiHeal,
                                        HealingStrategy::AiGenerated,
                                        suggestion.confidence,
                                    )
                                    .await);
                            }
                        }
                        Err(e) => {
                            warn!("AI heal failed for '{}': {}", description, e);
                            trail.ai_failure = Some(e);
                        }
                    }
                }
            }
        }

        // Exhausted
        warn!("All resolution avenues exhausted for '{}'", description);
        self.record(HealingRecord::failure(description, evicted)).await;
        Err(trail.into_error(description))
    }

    /// Probe suggestion candidates in order. Index 0 is the primary.
    async fn first_visible(
        &mut self,
        suggestion: &AiSuggestion,
        timeout: Duration,
        trail: &mut Trail,
    ) -> Option<(usize, ElementHandle)> {
        let offset = usize::from(suggestion.primary.is_none());
        for (i, candidate) in suggestion.candidates().enumerate() {
            trail.probed(candidate);
            if let Some(element) = probe(&mut self.driver, candidate, timeout).await.found() {
                return Some((i + offset, element));
            }
        }
        None
    }

    async fn accept_heal(
        &mut self,
        description: &str,
        old: Option<Locator>,
        element: ElementHandle,
        source: ResolutionSource,
        strategy: HealingStrategy,
        confidence: f64,
    ) -> Resolution {
        let locator = element.locator.clone();
        info!(
            "Resolved '{}' via {}: {}",
            description, source, locator
        );
        self.cache.put(description, locator.clone());
        self.record(HealingRecord::success(
            description,
            old,
            locator.clone(),
            strategy,
            confidence,
        ))
        .await;
        Resolution {
            element,
            locator,
            source,
        }
    }

    async fn record(&mut self, record: HealingRecord) {
        let record = match &self.test_name {
            Some(name) => record.with_test_name(name.clone()),
            None => record,
        };
        self.history.record(record).await;
    }

    async fn page_markup(&mut self, timeout: Duration) -> Option<String> {
        match tokio::time::timeout(timeout, self.driver.markup()).await {
            Ok(Ok(markup)) => Some(markup),
            Ok(Err(e)) => {
                warn!("Could not read page markup: {}", e);
                None
            }
            Err(_) => {
                warn!("Reading page markup timed out after {:?}", timeout);
                None
            }
        }
    }
}
