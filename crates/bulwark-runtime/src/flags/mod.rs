//! Runtime feature flags.

mod backend;
mod store;

pub use backend::{BackendError, FlagBackend, MemoryFlagBackend};
pub use store::FeatureFlagStore;
