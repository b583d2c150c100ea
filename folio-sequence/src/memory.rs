use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Counter, CounterStore, ScopeKey, StoreResult};

/// Mutex-guarded counter map for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<ScopeKey, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counters, e.g. when migrating numbering from another system.
    pub fn with_counters(counters: impl IntoIterator<Item = Counter>) -> Self {
        let map = counters
            .into_iter()
            .map(|counter| (counter.scope, counter.sequence_value))
            .collect();
        Self {
            counters: Mutex::new(map),
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, scope: &ScopeKey) -> StoreResult<u64> {
        let mut counters = self.counters.lock();
        let value = counters.entry(scope.clone()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn current(&self, scope: &ScopeKey) -> StoreResult<Option<u64>> {
        Ok(self.counters.lock().get(scope).copied())
    }

    async fn counters(&self) -> StoreResult<Vec<Counter>> {
        let mut counters: Vec<Counter> = self
            .counters
            .lock()
            .iter()
            .map(|(scope, value)| Counter {
                scope: scope.clone(),
                sequence_value: *value,
            })
            .collect();
        counters.sort_by(|a, b| a.scope.cmp(&b.scope));
        Ok(counters)
    }
}
