use lodestar_common::Locator;
use std::collections::HashMap;

/// Normalize a description into a cache key (trimmed, case-folded).
pub fn normalize_key(description: &str) -> String {
    description.trim().to_lowercase()
}

/// Last known-good locator per element description.
///
/// Entries are advisory: the resolver re-probes a hit before trusting it and
/// evicts it when it no longer resolves.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    entries: HashMap<String, Locator>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, description: &str) -> Option<&Locator> {
        self.entries.get(&normalize_key(description))
    }

    /// Insert or replace the entry, returning the previous locator.
    pub fn put(&mut self, description: &str, locator: Locator) -> Option<Locator> {
        self.entries.insert(normalize_key(description), locator)
    }

    pub fn evict(&mut self, description: &str) -> Option<Locator> {
        self.entries.remove(&normalize_key(description))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, description: &str) -> bool {
        self.entries.contains_key(&normalize_key(description))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
