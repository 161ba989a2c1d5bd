//! Composition root.
//!
//! One [`Bulwark`] owns the breaker registry, the flag store and the audit
//! sink for the whole process and hands out guarded operations that share
//! them.

use crate::advisor::{AdvisorService, ADVISOR_BREAKER};
use crate::audit::{AuditSink, NullAuditSink};
use crate::flags::{FeatureFlagStore, FlagBackend};
use crate::guard::GuardedOperation;
use crate::providers::LlmProvider;
use crate::resilience::BreakerRegistry;
use bulwark_core::ResilienceConfig;
use std::sync::Arc;

/// Shared resilience collaborators.
#[derive(Clone)]
pub struct Bulwark {
    config: Arc<ResilienceConfig>,
    breakers: Arc<BreakerRegistry>,
    flags: Arc<FeatureFlagStore>,
    audit: Arc<dyn AuditSink>,
}

impl Bulwark {
    /// Start building with default configuration.
    pub fn builder() -> BulwarkBuilder {
        BulwarkBuilder::new()
    }

    /// Configuration the collaborators were built from.
    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Shared breaker registry.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Shared flag store.
    pub fn flags(&self) -> &Arc<FeatureFlagStore> {
        &self.flags
    }

    /// Shared audit sink.
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Guarded operation using the shared breaker for `dependency`.
    pub fn guard(&self, dependency: &str) -> GuardedOperation {
        GuardedOperation::new(
            Arc::clone(&self.flags),
            self.breakers.get_or_create(dependency),
            Arc::clone(&self.audit),
        )
    }

    /// Market advisor on the shared `gemini-api` breaker.
    pub fn advisor(&self, provider: Arc<dyn LlmProvider>) -> AdvisorService {
        AdvisorService::new(self.guard(ADVISOR_BREAKER), provider)
    }
}

impl std::fmt::Debug for Bulwark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulwark")
            .field("config", &self.config)
            .field("breakers", &self.breakers)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Bulwark`].
pub struct BulwarkBuilder {
    config: ResilienceConfig,
    backend: Option<Arc<dyn FlagBackend>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl BulwarkBuilder {
    /// Builder with default configuration, no backend and no audit sink.
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
            backend: None,
            audit: None,
        }
    }

    /// Resolved configuration to build from.
    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    /// Distributed flag backend. Used only when coordination is enabled.
    pub fn flag_backend(mut self, backend: Arc<dyn FlagBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Audit sink. Defaults to discarding records.
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Create the shared collaborators.
    pub fn build(self) -> Bulwark {
        if self.config.flags.coordination_enabled && self.backend.is_none() {
            tracing::warn!("Flag coordination enabled but no backend configured, using local flags only");
        }

        Bulwark {
            breakers: Arc::new(BreakerRegistry::new(self.config.breaker.clone())),
            flags: Arc::new(FeatureFlagStore::new(&self.config.flags, self.backend)),
            audit: self.audit.unwrap_or_else(|| Arc::new(NullAuditSink)),
            config: Arc::new(self.config),
        }
    }
}

impl Default for BulwarkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
