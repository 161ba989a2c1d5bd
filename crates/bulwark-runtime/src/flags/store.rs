//! Feature flag store with three tiers of truth.
//!
//! Reads consult, in order:
//! 1. The distributed backend, when coordination is enabled and a backend is set
//! 2. The local cache, refreshed by every successful backend read and every write
//! 3. The value seeded from configuration at construction
//!
//! Nothing here returns an error to the caller. Backend failures are logged and
//! the next tier answers.

use super::backend::FlagBackend;
use bulwark_core::{parse_flag_value, FeatureFlag, FlagSettings, FlagSnapshot};
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide flag view, optionally coordinated through a [`FlagBackend`].
pub struct FeatureFlagStore {
    backend: Option<Arc<dyn FlagBackend>>,
    coordination_enabled: bool,
    prefix: String,
    ttl: Duration,
    defaults: FlagSnapshot,
    local: RwLock<FlagSnapshot>,
}

impl FeatureFlagStore {
    /// Build a store from settings. The backend is consulted only when
    /// `settings.coordination_enabled` is true.
    pub fn new(settings: &FlagSettings, backend: Option<Arc<dyn FlagBackend>>) -> Self {
        let defaults = seeded(settings);
        Self {
            backend,
            coordination_enabled: settings.coordination_enabled,
            prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
            local: RwLock::new(defaults.clone()),
            defaults,
        }
    }

    /// Store with no distributed tier: seeded defaults plus in-memory overrides.
    pub fn without_backend(settings: &FlagSettings) -> Self {
        Self::new(settings, None)
    }

    /// Whether reads and writes reach the distributed backend.
    pub fn is_coordinated(&self) -> bool {
        self.coordination_enabled && self.backend.is_some()
    }

    fn key(&self, flag: FeatureFlag) -> String {
        format!("{}{}", self.prefix, flag.as_str())
    }

    fn cached(&self, flag: FeatureFlag) -> bool {
        self.local
            .read()
            .get(&flag)
            .or_else(|| self.defaults.get(&flag))
            .copied()
            .unwrap_or(false)
    }

    fn coordinated_backend(&self) -> Option<&Arc<dyn FlagBackend>> {
        if self.coordination_enabled {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Current value of `flag`. Never fails.
    pub async fn is_enabled(&self, flag: FeatureFlag) -> bool {
        if let Some(backend) = self.coordinated_backend() {
            match backend.get(&self.key(flag)).await {
                Ok(Some(raw)) => {
                    let enabled = parse_flag_value(&raw);
                    self.local.write().insert(flag, enabled);
                    return enabled;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(flag = %flag, backend = backend.name(), error = %e, "Flag backend read failed, using cached value");
                }
            }
        }

        self.cached(flag)
    }

    /// Set `flag` locally and propagate it to the backend on a best-effort basis.
    ///
    /// The local value is authoritative for this process whatever the backend
    /// write outcome.
    pub async fn set_flag(&self, flag: FeatureFlag, enabled: bool) {
        self.local.write().insert(flag, enabled);

        let Some(backend) = self.coordinated_backend() else {
            tracing::debug!(flag = %flag, enabled, "Flag set locally");
            return;
        };

        let value = if enabled { "true" } else { "false" };
        match backend.set_ex(&self.key(flag), value, self.ttl).await {
            Ok(()) => tracing::info!(flag = %flag, enabled, "Flag updated"),
            Err(e) => {
                tracing::error!(flag = %flag, enabled, backend = backend.name(), error = %e, "Failed to propagate flag")
            }
        }
    }

    /// Every flag resolved through [`is_enabled`](Self::is_enabled).
    pub async fn get_all_flags(&self) -> FlagSnapshot {
        let values = join_all(FeatureFlag::ALL.iter().map(|flag| self.is_enabled(*flag))).await;
        FeatureFlag::ALL.into_iter().zip(values).collect()
    }

    /// Drop every backend entry under this store's prefix and reload the
    /// local cache from the seeded defaults.
    pub async fn reset_to_defaults(&self) {
        if let Some(backend) = self.coordinated_backend() {
            let cleared = match backend.keys(&self.prefix).await {
                Ok(keys) if keys.is_empty() => Ok(0),
                Ok(keys) => backend.del(&keys).await,
                Err(e) => Err(e),
            };

            match cleared {
                Ok(removed) => tracing::info!(removed, prefix = %self.prefix, "Cleared flag overrides"),
                Err(e) => {
                    tracing::error!(prefix = %self.prefix, error = %e, "Failed to clear flag overrides")
                }
            }
        }

        *self.local.write() = self.defaults.clone();
    }

    /// Switch off every non-essential feature in one step.
    pub async fn enable_fallback_mode(&self) {
        tracing::warn!("Enabling fallback mode, non-essential features disabled");
        for flag in FeatureFlag::NON_ESSENTIAL {
            self.set_flag(flag, false).await;
        }
    }
}

impl std::fmt::Debug for FeatureFlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureFlagStore")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("coordination_enabled", &self.coordination_enabled)
            .field("prefix", &self.prefix)
            .field("local", &*self.local.read())
            .finish()
    }
}

fn seeded(settings: &FlagSettings) -> FlagSnapshot {
    FeatureFlag::ALL
        .into_iter()
        .map(|flag| (flag, settings.default_for(flag)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{BackendError, MemoryFlagBackend};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl FlagBackend for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn del(&self, _keys: &[String]) -> Result<u64, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }

        async fn keys(&self, _prefix: &str) -> Result<Vec<String>, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    fn coordinated() -> FlagSettings {
        FlagSettings {
            coordination_enabled: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_defaults_without_backend() {
        let settings = FlagSettings::default().with_default(FeatureFlag::AiAdvisor, true);
        let store = FeatureFlagStore::without_backend(&settings);

        assert!(store.is_enabled(FeatureFlag::AiAdvisor).await);
        assert!(!store.is_enabled(FeatureFlag::Trading).await);
        assert!(!store.is_coordinated());
    }

    #[tokio::test]
    async fn test_local_override_without_backend() {
        let store = FeatureFlagStore::without_backend(&FlagSettings::default());
        store.set_flag(FeatureFlag::Trading, true).await;
        assert!(store.is_enabled(FeatureFlag::Trading).await);
    }

    #[tokio::test]
    async fn test_backend_value_wins_and_is_cached() {
        let backend = Arc::new(MemoryFlagBackend::new());
        backend
            .set_ex("feature:FEATURE_LIVE_PRICING", "true", Duration::from_secs(60))
            .await
            .unwrap();

        let store = FeatureFlagStore::new(&coordinated(), Some(backend.clone()));
        assert!(store.is_enabled(FeatureFlag::LivePricing).await);

        // Miss after deletion keeps the cached value
        backend
            .del(&["feature:FEATURE_LIVE_PRICING".to_string()])
            .await
            .unwrap();
        assert!(store.is_enabled(FeatureFlag::LivePricing).await);
    }

    #[tokio::test]
    async fn test_non_true_backend_value_is_false() {
        let backend = Arc::new(MemoryFlagBackend::new());
        backend
            .set_ex("feature:FEATURE_TRADING", "TRUE", Duration::from_secs(60))
            .await
            .unwrap();

        let settings = coordinated().with_default(FeatureFlag::Trading, true);
        let store = FeatureFlagStore::new(&settings, Some(backend));
        assert!(!store.is_enabled(FeatureFlag::Trading).await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_falls_back() {
        let settings = coordinated().with_default(FeatureFlag::PriceAlerts, true);
        let store = FeatureFlagStore::new(&settings, Some(Arc::new(Unreachable)));

        assert!(store.is_enabled(FeatureFlag::PriceAlerts).await);
        assert!(!store.is_enabled(FeatureFlag::AiAdvisor).await);

        store.set_flag(FeatureFlag::AiAdvisor, true).await;
        assert!(store.is_enabled(FeatureFlag::AiAdvisor).await);

        store.reset_to_defaults().await;
        assert!(!store.is_enabled(FeatureFlag::AiAdvisor).await);
    }

    #[tokio::test]
    async fn test_backend_ignored_when_coordination_disabled() {
        let backend = Arc::new(MemoryFlagBackend::new());
        backend
            .set_ex("feature:FEATURE_TRADING", "true", Duration::from_secs(60))
            .await
            .unwrap();

        let store = FeatureFlagStore::new(&FlagSettings::default(), Some(backend.clone()));
        assert!(!store.is_enabled(FeatureFlag::Trading).await);

        store.set_flag(FeatureFlag::AiAdvisor, true).await;
        assert_eq!(backend.get("feature:FEATURE_AI_ADVISOR").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_propagate_between_stores() {
        let backend: Arc<dyn FlagBackend> = Arc::new(MemoryFlagBackend::new());
        let first = FeatureFlagStore::new(&coordinated(), Some(backend.clone()));
        let second = FeatureFlagStore::new(&coordinated(), Some(backend));

        first.set_flag(FeatureFlag::Recommendations, true).await;
        assert!(second.is_enabled(FeatureFlag::Recommendations).await);
    }

    #[tokio::test]
    async fn test_get_all_flags_covers_every_flag() {
        let settings = FlagSettings::default().with_default(FeatureFlag::Trading, true);
        let store = FeatureFlagStore::without_backend(&settings);

        let all = store.get_all_flags().await;
        assert_eq!(all.len(), FeatureFlag::ALL.len());
        assert!(all[&FeatureFlag::Trading]);
        assert!(!all[&FeatureFlag::AiAdvisor]);
    }

    #[tokio::test]
    async fn test_fallback_mode_disables_only_non_essential() {
        let mut settings = FlagSettings::default();
        for flag in FeatureFlag::ALL {
            settings = settings.with_default(flag, true);
        }
        let store = FeatureFlagStore::without_backend(&settings);
        store.enable_fallback_mode().await;

        let all = store.get_all_flags().await;
        assert!(!all[&FeatureFlag::AiAdvisor]);
        assert!(!all[&FeatureFlag::LivePricing]);
        assert!(!all[&FeatureFlag::Recommendations]);
        assert!(all[&FeatureFlag::PriceAlerts]);
        assert!(all[&FeatureFlag::Trading]);
    }

    #[tokio::test]
    async fn test_reset_clears_backend_namespace() {
        let backend = Arc::new(MemoryFlagBackend::new());
        backend
            .set_ex("other:keep", "1", Duration::from_secs(60))
            .await
            .unwrap();
        let store = FeatureFlagStore::new(&coordinated(), Some(backend.clone()));

        store.set_flag(FeatureFlag::Trading, true).await;
        store.reset_to_defaults().await;

        assert!(backend.keys("feature:").await.unwrap().is_empty());
        assert_eq!(backend.get("other:keep").await.unwrap().as_deref(), Some("1"));
        assert!(!store.is_enabled(FeatureFlag::Trading).await);
    }
}
