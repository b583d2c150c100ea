use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ScopeKey, StoreResult};

/// Persisted counter row: the last value issued for a scope.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub scope: ScopeKey,
    pub sequence_value: u64,
}

/// Abstraction over durable counter storage engines.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `scope`, creating it at `1` when
    /// absent, and return the post-increment value.
    ///
    /// Implementations must perform the find, increment and create steps as one
    /// indivisible operation per scope. A lost creation race is reported as
    /// [`StoreError::Conflict`](crate::StoreError::Conflict).
    async fn increment(&self, scope: &ScopeKey) -> StoreResult<u64>;

    /// Read the last issued value without modifying the counter.
    async fn current(&self, scope: &ScopeKey) -> StoreResult<Option<u64>>;

    /// List every counter ordered by document type and fiscal year.
    async fn counters(&self) -> StoreResult<Vec<Counter>>;
}
