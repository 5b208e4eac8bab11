//! Error types for the Risco cloud client
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain passwords, codes or pins.

/// Top-level error type for cloud operations
#[derive(Debug, thiserror::Error)]
pub enum RiscoError {
    /// Network or connection failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side rejected the credentials (or the site pin)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Internal signal that the current session is no longer accepted
    #[error("Session expired")]
    SessionExpired,

    /// Non-2xx HTTP status on an otherwise well-formed exchange
    #[error("HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Response body did not have the expected JSON shape
    #[error("Unexpected response from {endpoint}: {details}")]
    RemoteProtocol { endpoint: String, details: String },

    /// The panel refused a state-changing command
    #[error("Command rejected by panel (error {code}): {payload}")]
    Command { code: i64, payload: serde_json::Value },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RiscoError {
    /// Whether the retry executor should try the failed call again.
    ///
    /// A rejected command is never retried: repeating it could apply the
    /// arm/disarm twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            RiscoError::Transport(_)
            | RiscoError::Auth(_)
            | RiscoError::SessionExpired
            | RiscoError::HttpStatus { .. } => true,
            RiscoError::RemoteProtocol { .. } | RiscoError::Command { .. } | RiscoError::Config(_) => {
                false
            }
        }
    }
}

/// Errors from loading client configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}
