//! Flag check, circuit breaker and degradation composed into one call.
//!
//! A guarded operation always returns a usable value. The live path runs only
//! when its feature flag is on and its breaker admits the call; otherwise, or
//! when the live call fails, the degradation closure answers. Whichever path
//! is taken, one [`AuditRecord`] is handed to the [`AuditSink`].

use crate::audit::AuditSink;
use crate::flags::FeatureFlagStore;
use crate::resilience::{BreakerError, CircuitBreaker, Guarded};
use bulwark_core::{AuditRecord, FallbackReason, FeatureFlag};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Identity of one guarded call.
#[derive(Debug, Clone)]
pub struct GuardedCall {
    /// Operation identifier written to the audit record (e.g. "ai.advice")
    pub operation: String,

    /// Flag gating the live path
    pub flag: FeatureFlag,

    /// Input summary written to the audit record
    pub input: String,

    /// Session or request correlation id
    pub correlation_id: String,
}

impl GuardedCall {
    /// Describe one call for the audit trail.
    pub fn new(
        operation: impl Into<String>,
        flag: FeatureFlag,
        input: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            flag,
            input: input.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// One externally dependent operation and its collaborators.
#[derive(Clone)]
pub struct GuardedOperation {
    flags: Arc<FeatureFlagStore>,
    breaker: Arc<CircuitBreaker>,
    audit: Arc<dyn AuditSink>,
}

impl GuardedOperation {
    /// Bundle the flag store, breaker and audit sink for one dependency.
    pub fn new(
        flags: Arc<FeatureFlagStore>,
        breaker: Arc<CircuitBreaker>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            flags,
            breaker,
            audit,
        }
    }

    /// Breaker guarding the live path.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Flag store consulted before each call.
    pub fn flags(&self) -> &Arc<FeatureFlagStore> {
        &self.flags
    }

    /// Sink receiving one record per call.
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Run `live` under the flag and breaker, substituting `degrade()` when
    /// the live path is skipped or fails. Never returns an error.
    pub async fn run<T, E, F, Fut, D>(&self, call: GuardedCall, live: F, degrade: D) -> Guarded<T>
    where
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        D: FnOnce() -> T,
    {
        let guarded = if !self.flags.is_enabled(call.flag).await {
            tracing::debug!(operation = %call.operation, flag = %call.flag, "Feature disabled, using fallback");
            Guarded::degraded(degrade(), FallbackReason::FlagDisabled)
        } else {
            match self.breaker.execute(live).await {
                Ok(value) => Guarded::live(value),
                Err(BreakerError::Open { name }) => {
                    tracing::warn!(operation = %call.operation, breaker = %name, "Circuit breaker open, using fallback");
                    Guarded::degraded(degrade(), FallbackReason::BreakerOpen)
                }
                Err(BreakerError::Upstream(e)) => {
                    tracing::error!(operation = %call.operation, breaker = %self.breaker.name(), error = %e, "Live call failed, using fallback");
                    Guarded::degraded(degrade(), FallbackReason::UpstreamFailure)
                }
            }
        };

        self.persist(call, &guarded).await;
        guarded
    }

    async fn persist<T: Serialize>(&self, call: GuardedCall, guarded: &Guarded<T>) {
        let output = match serde_json::to_value(&guarded.value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(operation = %call.operation, error = %e, "Failed to serialize audit output");
                serde_json::Value::Null
            }
        };

        let operation = call.operation.clone();
        let record = AuditRecord::new(
            call.operation,
            call.input,
            output,
            guarded.fallback_reason,
            call.correlation_id,
        );

        if let Err(e) = self.audit.record(record).await {
            tracing::error!(operation = %operation, error = %e, "Failed to persist audit record");
        }
    }
}

impl std::fmt::Debug for GuardedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedOperation")
            .field("breaker", &self.breaker)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditError, MemoryAuditSink};
    use async_trait::async_trait;
    use bulwark_core::{BreakerSettings, BreakerState, FlagSettings};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RejectingSink;

    #[async_trait]
    impl AuditSink for RejectingSink {
        async fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Rejected("database offline".into()))
        }
    }

    fn operation(flag_on: bool, threshold: u32, sink: Arc<dyn AuditSink>) -> GuardedOperation {
        let settings = FlagSettings::default().with_default(FeatureFlag::AiAdvisor, flag_on);
        let breaker = CircuitBreaker::new(
            "gemini-api",
            BreakerSettings {
                failure_threshold: threshold,
                ..Default::default()
            },
        );
        GuardedOperation::new(
            Arc::new(FeatureFlagStore::without_backend(&settings)),
            Arc::new(breaker),
            sink,
        )
    }

    fn call() -> GuardedCall {
        GuardedCall::new("ai.advice", FeatureFlag::AiAdvisor, "should I buy?", "s-1")
    }

    #[tokio::test]
    async fn test_live_path() {
        let sink = Arc::new(MemoryAuditSink::new());
        let op = operation(true, 3, sink.clone());

        let result = op
            .run(call(), || async { Ok::<_, String>("live".to_string()) }, || "fallback".to_string())
            .await;

        assert_eq!(result, Guarded::live("live".to_string()));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].fallback_used);
        assert_eq!(records[0].output, serde_json::json!("live"));
        assert_eq!(records[0].correlation_id, "s-1");
    }

    #[tokio::test]
    async fn test_flag_off_never_calls_live() {
        let sink = Arc::new(MemoryAuditSink::new());
        let op = operation(false, 3, sink.clone());
        let calls = AtomicUsize::new(0);

        let result = op
            .run(
                call(),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("live")
                },
                || "fallback",
            )
            .await;

        assert_eq!(result.value, "fallback");
        assert_eq!(result.fallback_reason, Some(FallbackReason::FlagDisabled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(op.breaker().status().metrics.success_count, 0);
        assert!(sink.records()[0].fallback_used);
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_and_counts() {
        let sink = Arc::new(MemoryAuditSink::new());
        let op = operation(true, 3, sink.clone());

        let result = op
            .run(call(), || async { Err::<&str, _>("timeout") }, || "fallback")
            .await;

        assert_eq!(result.value, "fallback");
        assert_eq!(result.fallback_reason, Some(FallbackReason::UpstreamFailure));
        assert_eq!(op.breaker().status().metrics.failure_count, 1);
        assert_eq!(
            sink.records()[0].fallback_reason,
            Some(FallbackReason::UpstreamFailure)
        );
    }

    #[tokio::test]
    async fn test_open_breaker_degrades_like_disabled_flag() {
        let open = operation(true, 1, Arc::new(MemoryAuditSink::new()));
        open.run(call(), || async { Err::<&str, _>("down") }, || "fallback")
            .await;
        assert_eq!(open.breaker().state(), BreakerState::Open);

        let via_breaker = open
            .run(call(), || async { Ok::<_, &str>("live") }, || "fallback")
            .await;

        let disabled = operation(false, 1, Arc::new(MemoryAuditSink::new()));
        let via_flag = disabled
            .run(call(), || async { Ok::<_, &str>("live") }, || "fallback")
            .await;

        assert_eq!(via_breaker.value, via_flag.value);
        assert_eq!(via_breaker.fallback_used, via_flag.fallback_used);
        assert_eq!(via_breaker.fallback_reason, Some(FallbackReason::BreakerOpen));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_result() {
        let op = operation(true, 3, Arc::new(RejectingSink));
        let result = op
            .run(call(), || async { Ok::<_, &str>(42) }, || 0)
            .await;
        assert_eq!(result, Guarded::live(42));
    }
}
