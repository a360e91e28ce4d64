//! Strategy registry for dispatching inbound items by media kind.

use std::collections::HashMap;
use std::sync::Arc;

use lanca_core::{Error, ExtractionStrategy, InboundItem, MediaKind, Result, StrategyResult};

/// Registry mapping media kinds to their strategy implementations.
pub struct StrategyRegistry {
    strategies: HashMap<MediaKind, Arc<dyn ExtractionStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy. Replaces any existing strategy for the same kind.
    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    /// Extract using the strategy registered for the given kind.
    pub async fn extract(&self, kind: MediaKind, item: &InboundItem) -> Result<StrategyResult> {
        let strategy = self.strategies.get(&kind).ok_or_else(|| {
            Error::Internal(format!("No strategy registered for kind: {:?}", kind))
        })?;
        strategy.extract(item).await
    }

    /// Look up a strategy by kind.
    pub fn get(&self, kind: MediaKind) -> Option<&Arc<dyn ExtractionStrategy>> {
        self.strategies.get(&kind)
    }

    /// List all kinds that have registered strategies.
    pub fn available_kinds(&self) -> Vec<MediaKind> {
        self.strategies.keys().copied().collect()
    }

    /// Check if a strategy is registered for the given kind.
    pub fn has_strategy(&self, kind: MediaKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Run health checks on all registered strategies.
    pub async fn health_check_all(&self) -> HashMap<MediaKind, bool> {
        let mut results = HashMap::new();
        for (kind, strategy) in &self.strategies {
            let healthy = strategy.health_check().await.unwrap_or(false);
            results.insert(*kind, healthy);
        }
        results
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::OfxStrategy;

    #[test]
    fn test_registry_new_is_empty() {
        let registry = StrategyRegistry::new();
        assert!(registry.available_kinds().is_empty());
        assert!(!registry.has_strategy(MediaKind::Ofx));
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(OfxStrategy));
        assert!(registry.has_strategy(MediaKind::Ofx));
        assert!(!registry.has_strategy(MediaKind::Pdf));
        assert_eq!(registry.available_kinds().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_extract_missing_strategy() {
        let registry = StrategyRegistry::new();
        let item = InboundItem::new(b"data".to_vec(), "application/pdf", "f.pdf");
        let result = registry.extract(MediaKind::Pdf, &item).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_registry_health_check_all() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(OfxStrategy));

        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 1);
        assert!(results[&MediaKind::Ofx]);
    }
}
