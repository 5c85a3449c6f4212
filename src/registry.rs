// ABOUTME: Ordered registry of named transport strategies with lazy loaders.
// ABOUTME: Index order is fallback priority; loads are memoized on success.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::traits::Strategy;

/// Boxed future produced by a strategy loader
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Strategy>>> + Send>>;

/// Factory that loads a strategy module on demand
pub type StrategyLoader = Box<dyn Fn() -> LoadFuture + Send + Sync>;

/// A named strategy with a lazy, memoized loader
pub struct StrategyDescriptor {
    name: String,
    loader: StrategyLoader,
    loaded: OnceCell<Arc<dyn Strategy>>,
}

impl StrategyDescriptor {
    /// Strategy name (unique, stable identifier)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the strategy module. The first success is cached; a failed load is
    /// not, so a later scan retries the loader.
    pub async fn load(&self) -> Result<Arc<dyn Strategy>> {
        self.loaded
            .get_or_try_init(|| (self.loader)())
            .await
            .cloned()
    }
}

/// Ordered list of transport strategies. Order defines both the initial
/// fallback priority and the reconnection retry order; every scan starts at
/// index 0. Immutable once built.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<StrategyDescriptor>,
}

impl StrategyRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a strategy with an async loader. Registration order is priority
    /// order.
    pub fn register<F, Fut>(mut self, name: &str, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Strategy>>> + Send + 'static,
    {
        self.entries.push(StrategyDescriptor {
            name: name.to_string(),
            loader: Box::new(move || {
                let fut: LoadFuture = Box::pin(loader());
                fut
            }),
            loaded: OnceCell::new(),
        });
        self
    }

    /// Append an already-constructed strategy (no async load step)
    pub fn register_ready(self, name: &str, strategy: Arc<dyn Strategy>) -> Self {
        self.register(name, move || {
            let strategy = strategy.clone();
            async move { Ok(strategy) }
        })
    }

    /// Number of registered strategies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no strategies are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strategy names in priority order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    /// Get a descriptor by priority index
    pub fn descriptor(&self, index: usize) -> Option<&StrategyDescriptor> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_registry() {
        let registry = StrategyRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.names().is_empty());
        assert!(registry.descriptor(0).is_none());
    }

    #[test]
    fn test_registration_order_is_priority_order() {
        let registry = StrategyRegistry::new()
            .register_ready("nostr", MockStrategy::healthy())
            .register_ready("torrent", MockStrategy::healthy())
            .register_ready("mqtt", MockStrategy::healthy())
            .register_ready("ipfs", MockStrategy::healthy());
        assert_eq!(registry.names(), vec!["nostr", "torrent", "mqtt", "ipfs"]);
        assert_eq!(registry.descriptor(1).unwrap().name(), "torrent");
    }

    #[tokio::test]
    async fn test_load_is_memoized_on_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = StrategyRegistry::new().register("nostr", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(MockStrategy::healthy() as Arc<dyn Strategy>) }
        });

        let descriptor = registry.descriptor(0).unwrap();
        descriptor.load().await.unwrap();
        descriptor.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = StrategyRegistry::new().register("torrent", move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("tracker unreachable")
                }
                Ok(MockStrategy::healthy() as Arc<dyn Strategy>)
            }
        });

        let descriptor = registry.descriptor(0).unwrap();
        assert!(descriptor.load().await.is_err());
        assert!(descriptor.load().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
