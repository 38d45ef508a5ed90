//! Environment variable parsing with warn-level logging for invalid values.

use std::time::Duration;

use crate::constants::{BUSY_TIMEOUT_ENV, DEFAULT_BUSY_TIMEOUT_MS};

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently.
/// - If the variable is set but cannot be parsed: logs a warning and returns `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => match v.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            },
        },
        Err(_) => default,
    }
}

/// SQLite busy timeout, from `TERRAREG_SCHEMA_BUSY_TIMEOUT_MS`.
#[must_use]
pub fn busy_timeout() -> Duration {
    Duration::from_millis(env_parse_with_default(BUSY_TIMEOUT_ENV, DEFAULT_BUSY_TIMEOUT_MS))
}
