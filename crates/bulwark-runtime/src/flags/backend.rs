//! Distributed key/value backend used to coordinate flags across instances.
//!
//! The store needs only four primitives: GET, SET with expiry, DEL and a
//! prefix scan. Any shared cache that offers them can sit behind
//! [`FlagBackend`]; [`MemoryFlagBackend`] is the in-process implementation.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from a flag backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Flag backend unavailable: {0}")]
    Unavailable(String),

    #[error("Flag backend operation failed: {0}")]
    Operation(String),
}

/// Key/value primitives the flag store relies on.
#[async_trait]
pub trait FlagBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, BackendError>;

    /// Keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, BackendError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend built on moka, honoring per-key expiry.
pub struct MemoryFlagBackend {
    cache: Cache<String, StoredValue>,
}

impl MemoryFlagBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }
}

impl Default for MemoryFlagBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlagBackend for MemoryFlagBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.cache.get(key).await.map(|stored| stored.value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        if ttl.is_zero() {
            return Err(BackendError::Operation(format!(
                "expiry for '{}' must be positive",
                key
            )));
        }

        self.cache
            .insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        let mut removed = 0;
        for key in keys {
            if self.cache.remove(key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
