//! # bulwark-core
//!
//! Deterministic building blocks for the Bulwark resilience layer.
//!
//! This crate holds everything that does not need an async runtime:
//! - The closed set of [`FeatureFlag`]s and their snapshots
//! - Circuit breaker state and status types shared with observability
//! - The static degradation tables used when a live dependency is unsafe to call
//! - Audit and trend records handed to the persistence collaborator
//! - Layered configuration: defaults, an optional YAML file, then environment
//!
//! ## Key Guarantees
//!
//! 1. **Total degradation**: [`DegradationPolicy::resolve`] answers every input
//!    with a non-empty substitute
//! 2. **No I/O**: apart from reading a config file, nothing here touches the network
//! 3. **Resolved once**: [`ResilienceConfig`] is built at startup and passed into
//!    constructors instead of being read from the environment ad hoc
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulwark_core::{degradation, FeatureFlag, ResilienceConfig};
//!
//! let config = ResilienceConfig::from_env()?;
//! let seeded = config.flags.default_for(FeatureFlag::AiAdvisor);
//!
//! let advice = degradation::advice().resolve("where should I store bars?");
//! assert!(!advice.is_empty());
//! ```

pub mod audit;
pub mod config;
pub mod degradation;
pub mod flags;
pub mod market;
pub mod types;

pub use audit::{AuditRecord, FallbackReason};
pub use config::{BreakerSettings, ConfigError, FlagSettings, ResilienceConfig};
pub use degradation::{DegradationPolicy, DegradationTable};
pub use flags::{parse_flag_value, FeatureFlag, FlagSnapshot, UnknownFlag};
pub use market::{PriceSummary, TrendDirection, TrendPeriod, TrendRecord, UnknownPeriod};
pub use types::{BreakerMetrics, BreakerState, BreakerStatus};
