//! risco-cloud - polling client for the Risco alarm-panel cloud
//!
//! Core library exposing the session manager, alarm model and transports.

// Public modules
pub mod config;
pub mod constants;
pub mod core;
pub mod logger;
pub mod models;
pub mod platform;
pub mod utils;

// Re-export commonly used types
pub use config::ClientConfig;
pub use core::{CloudSessionManager, ManagerConfig, SessionState, StateChange, StatePoller};
pub use models::{AlarmState, ArmCommand, PinCredential, SecureString, UserCredential, Username};
pub use platform::HttpTransportFactory;
pub use utils::{ConfigError, RetryConfig, RiscoError};

/// Session manager talking to the real cloud over HTTP
pub type HttpSessionManager = CloudSessionManager<HttpTransportFactory>;

/// Build an HTTP session manager from a loaded configuration
pub fn manager_from_config(config: &ClientConfig) -> HttpSessionManager {
    CloudSessionManager::new(
        config.transport_factory(),
        config.user_credential(),
        config.pin_credential(),
        config.manager_config(),
    )
}
