//! Named breakers shared across the process.

use super::CircuitBreaker;
use bulwark_core::{BreakerSettings, BreakerStatus};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One breaker per dependency name, all built from the same settings.
///
/// Every caller guarding the same dependency must share the breaker returned
/// here, otherwise failures are counted per caller instead of per dependency.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    settings: BreakerSettings,
    breakers: RwLock<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create an empty registry; every breaker gets `settings`.
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Breaker for `name`, created on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(name) {
            return Arc::clone(existing);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(breaker = %name, "Registering circuit breaker");
            Arc::new(CircuitBreaker::new(name, self.settings.clone()))
        }))
    }

    /// Breaker for `name`, if one was created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Status of every registered breaker, ordered by name.
    pub fn statuses(&self) -> Vec<BreakerStatus> {
        self.breakers.read().values().map(|cb| cb.status()).collect()
    }

    /// Force every registered breaker back to CLOSED.
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }
}
