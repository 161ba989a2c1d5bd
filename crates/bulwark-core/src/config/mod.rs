//! Resilience configuration.
//!
//! Configuration is resolved once at startup and passed into constructors.
//! Files are validated against an embedded JSON Schema before use.

mod parser;
mod schema;

pub use parser::{
    BreakerSettings, ConfigError, FlagSettings, ResilienceConfig, ENV_BREAKER_RESET_TIMEOUT,
    ENV_BREAKER_THRESHOLD, ENV_BREAKER_TIMEOUT, ENV_FLAGS_ENABLED,
};
pub use schema::validate_config_schema;
