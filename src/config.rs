//! Client configuration from the process environment
//!
//! Credentials are supplied through environment variables so they never
//! appear on the command line.

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_LANG, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::core::ManagerConfig;
use crate::models::{PinCredential, SecureString, UserCredential, Username};
use crate::platform::HttpTransportFactory;
use crate::utils::{ConfigError, RetryConfig};
use std::time::Duration;

pub const ENV_USERNAME: &str = "RISCO_USERNAME";
pub const ENV_PASSWORD: &str = "RISCO_PASSWORD";
pub const ENV_CODE: &str = "RISCO_CODE";
pub const ENV_PIN: &str = "RISCO_PIN";
pub const ENV_LANG: &str = "RISCO_LANG";
pub const ENV_BASE_URL: &str = "RISCO_BASE_URL";
pub const ENV_SITE_LOGIN: &str = "RISCO_SITE_LOGIN";
pub const ENV_MAX_RETRIES: &str = "RISCO_MAX_RETRIES";
pub const ENV_MAX_ELAPSED_SECS: &str = "RISCO_MAX_ELAPSED_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "RISCO_REQUEST_TIMEOUT_SECS";

/// Everything needed to build a session manager
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: Username,
    pub password: SecureString,
    pub code: Option<SecureString>,
    pub pin: Option<SecureString>,
    pub lang: String,
    pub base_url: String,
    pub site_login: bool,
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup (empty values count as unset)
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let username = Username::new(get(ENV_USERNAME).ok_or(ConfigError::Missing(ENV_USERNAME))?)?;
        let password = SecureString::new(get(ENV_PASSWORD).ok_or(ConfigError::Missing(ENV_PASSWORD))?);

        let mut retry = RetryConfig::default();
        if let Some(raw) = get(ENV_MAX_RETRIES) {
            retry.max_retries = Some(parse_number(ENV_MAX_RETRIES, &raw)?);
        }
        if let Some(raw) = get(ENV_MAX_ELAPSED_SECS) {
            retry.max_elapsed = Some(Duration::from_secs(parse_number(ENV_MAX_ELAPSED_SECS, &raw)?));
        }

        let request_timeout = match get(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_number(ENV_REQUEST_TIMEOUT_SECS, &raw)?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let site_login = match get(ENV_SITE_LOGIN) {
            Some(raw) => parse_bool(ENV_SITE_LOGIN, &raw)?,
            None => false,
        };
        let pin = get(ENV_PIN).map(SecureString::new);
        if site_login && pin.is_none() {
            return Err(ConfigError::Missing(ENV_PIN));
        }

        Ok(Self {
            username,
            password,
            code: get(ENV_CODE).map(SecureString::new),
            pin,
            lang: get(ENV_LANG).unwrap_or_else(|| DEFAULT_LANG.to_string()),
            base_url: get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            site_login,
            retry,
            request_timeout,
        })
    }

    pub fn user_credential(&self) -> UserCredential {
        let creds = UserCredential::new(self.username.clone(), self.password.clone())
            .with_lang(self.lang.clone());
        match &self.code {
            Some(code) => creds.with_code(code.clone()),
            None => creds,
        }
    }

    pub fn pin_credential(&self) -> Option<PinCredential> {
        self.pin
            .as_ref()
            .map(|pin| PinCredential::new(pin.clone()).with_lang(self.lang.clone()))
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            retry: self.retry.clone(),
            site_login: self.site_login,
        }
    }

    pub fn transport_factory(&self) -> HttpTransportFactory {
        HttpTransportFactory::new(self.base_url.clone(), self.request_timeout)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("expected a non-negative integer, got '{}'", raw.trim()),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
