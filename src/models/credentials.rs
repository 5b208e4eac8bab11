//! Credential value objects for the Risco cloud
//!
//! SECURITY: Secret-bearing types implement Drop to clear sensitive data.
//! This includes [`WireForm`]. The url-encoded body that `reqwest` builds
//! from a form is owned by the HTTP client and is not zeroed.

use crate::constants::DEFAULT_LANG;
use crate::utils::ConfigError;
use serde::{Serialize, Serializer};
use std::fmt;

/// Form body sent to the remote service, in field order
///
/// Values are held as [`SecureString`] so passwords and pins copied into a
/// form are cleared along with it.
#[derive(Clone, Debug, Default)]
pub struct WireForm {
    fields: Vec<(String, SecureString)>,
}

impl WireForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), SecureString::new(value)));
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First value sent under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serialises as a sequence of `(key, value)` pairs for url-encoding
impl Serialize for WireForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Cloud account username
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    /// Create a new username after validation
    pub fn new(username: impl Into<String>) -> Result<Self, ConfigError> {
        let username = username.into();

        if username.trim().is_empty() {
            return Err(ConfigError::InvalidUsername(
                "Username cannot be empty".to_string(),
            ));
        }

        if username.len() > 256 {
            return Err(ConfigError::InvalidUsername(
                "Username exceeds maximum length (256)".to_string(),
            ));
        }

        Ok(Username(username))
    }

    /// Get the username as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Username {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Username::new(value)
    }
}

/// Secret that zeros memory on drop
///
/// SECURITY: This type never implements Display or Debug in a way that reveals the secret.
pub struct SecureString(String);

impl Clone for SecureString {
    fn clone(&self) -> Self {
        SecureString(self.0.clone())
    }
}

impl SecureString {
    /// Create a new secure string
    pub fn new(secret: impl Into<String>) -> Self {
        SecureString(secret.into())
    }

    /// Get the secret as a string slice
    ///
    /// Use this only when building a request body.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        // SAFETY: We own this String and are zeroing it before drop
        unsafe {
            let bytes = self.0.as_bytes_mut();
            for byte in bytes {
                std::ptr::write_volatile(byte, 0);
            }
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(*** {} bytes ***)", self.0.len())
    }
}

/// Credentials for the initial login
///
/// Built once at startup from configuration and never mutated.
#[derive(Clone, Debug)]
pub struct UserCredential {
    username: Username,
    password: SecureString,
    code: Option<SecureString>,
    lang: String,
}

impl UserCredential {
    pub fn new(username: Username, password: SecureString) -> Self {
        UserCredential {
            username,
            password,
            code: None,
            lang: DEFAULT_LANG.to_string(),
        }
    }

    /// Attach the panel code some sites expect alongside the password
    pub fn with_code(mut self, code: SecureString) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Form fields for the login endpoint
    pub fn to_wire_format(&self) -> WireForm {
        let mut form = WireForm::new()
            .with("username", self.username.as_str())
            .with("password", self.password.as_str());
        if let Some(code) = &self.code {
            form.push("code", code.as_str());
        }
        form.push("langId", self.lang.as_str());
        form
    }
}

/// Pin used for site selection after login
#[derive(Clone, Debug)]
pub struct PinCredential {
    pin: SecureString,
    lang: String,
}

impl PinCredential {
    pub fn new(pin: SecureString) -> Self {
        PinCredential {
            pin,
            lang: DEFAULT_LANG.to_string(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Form fields for the site login endpoint
    pub fn to_wire_format(&self) -> WireForm {
        WireForm::new()
            .with("Pin", self.pin.as_str())
            .with("langId", self.lang.as_str())
    }
}
