use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::{
    format_number, Clock, CounterStore, DocumentNumber, DocumentType, ScopeKey, SequenceError,
    SequenceResult, SystemClock,
};

/// Bounded, linearly backed-off retry of uniqueness conflicts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Delay after the failed `attempt` (1-based) before trying again.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Hands out gapless per-scope sequence numbers backed by a shared counter store.
///
/// The allocator holds no lock of its own; the store's atomic increment is the
/// only synchronization point between concurrent callers.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Scope the next allocation of `document_type` would draw from.
    pub fn scope_for(&self, document_type: DocumentType) -> ScopeKey {
        ScopeKey::for_document(document_type, self.clock.as_ref())
    }

    /// Allocate the next sequence value for `document_type`.
    pub async fn allocate(&self, document_type: DocumentType) -> SequenceResult<u64> {
        self.allocate_scoped(document_type)
            .await
            .map(|(_, value)| value)
    }

    /// Allocate a value and render it as the document number callers persist.
    pub async fn generate_formatted_number(
        &self,
        document_type: DocumentType,
    ) -> SequenceResult<DocumentNumber> {
        let (scope, value) = self.allocate_scoped(document_type).await?;
        let fiscal_year = scope.fiscal_year.as_deref().unwrap_or_default();
        Ok(format_number(document_type, value, fiscal_year))
    }

    async fn allocate_scoped(
        &self,
        document_type: DocumentType,
    ) -> SequenceResult<(ScopeKey, u64)> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let scope = self.scope_for(document_type);
            match self.store.increment(&scope).await {
                Ok(value) => {
                    debug!(%document_type, %scope, value, attempt, "sequence allocated");
                    return Ok((scope, value));
                }
                Err(err) if err.is_conflict() => {
                    warn!(
                        %document_type,
                        %scope,
                        attempt,
                        max_attempts,
                        error = %err,
                        "counter creation conflicted"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
                Err(err) => {
                    error!(%document_type, %scope, error = %err, "counter store failed");
                    return Err(err.into());
                }
            }
        }
        error!(%document_type, attempts = max_attempts, "sequence allocation exhausted");
        Err(SequenceError::Exhausted {
            document_type,
            attempts: max_attempts,
        })
    }
}
