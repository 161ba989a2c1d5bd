//! # bulwark-runtime
//!
//! Async resilience layer for calls to unreliable dependencies.
//!
//! This crate wires the deterministic pieces of `bulwark-core` into running
//! components:
//! - [`CircuitBreaker`] state machines, one per dependency via [`BreakerRegistry`]
//! - [`FeatureFlagStore`] with an optional distributed [`FlagBackend`]
//! - [`GuardedOperation`], which always answers: live when it can, from the
//!   degradation tables when it cannot
//! - [`AdvisorService`], the model-backed market advisor built on top
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulwark_core::ResilienceConfig;
//! use bulwark_runtime::{Bulwark, MemoryAuditSink, UnconfiguredProvider};
//!
//! let bulwark = Bulwark::builder()
//!     .config(ResilienceConfig::from_env()?)
//!     .audit(Arc::new(MemoryAuditSink::new()))
//!     .build();
//!
//! let advisor = bulwark.advisor(Arc::new(UnconfiguredProvider::new("no key")));
//! let advice = advisor.generate_advice("Is now a good time to buy?", None).await?;
//! assert!(advice.fallback_used);
//! ```

pub mod advisor;
pub mod audit;
pub mod context;
pub mod flags;
pub mod guard;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use advisor::{AdvisorError, AdvisorService, AdvisorStatus, ServiceHealth, ADVISOR_BREAKER};
pub use audit::{AuditError, AuditLine, AuditSink, JsonLinesAuditSink, MemoryAuditSink, NullAuditSink};
pub use context::{Bulwark, BulwarkBuilder};
pub use flags::{BackendError, FeatureFlagStore, FlagBackend, MemoryFlagBackend};
pub use guard::{GuardedCall, GuardedOperation};
pub use providers::{
    CompletionConfig, GeminiProvider, LlmProvider, ProviderError, ProviderRegistry,
    UnconfiguredProvider,
};
pub use resilience::{BreakerError, BreakerRegistry, CircuitBreaker, Guarded};
