use thiserror::Error;

/// Settings are validated once at startup; a malformed override is a
/// `ConfigError`, never a panic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {key} has a malformed value {value:?}: {reason}")]
    Malformed {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}
