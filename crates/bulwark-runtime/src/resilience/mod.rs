//! Resilience patterns for bulwark-runtime.
//!
//! This module provides:
//! - Circuit breaker to stop calling a failing dependency
//! - A registry sharing one breaker per dependency name
//! - The guarded result shape returned when degradation may apply

mod circuit_breaker;
mod fallback;
mod registry;

pub use circuit_breaker::{BreakerError, CircuitBreaker};
pub use fallback::Guarded;
pub use registry::BreakerRegistry;
