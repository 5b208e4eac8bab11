//! Transport abstraction and session store
//!
//! [`CloudTransport`] allows testing without the real cloud by supporting mock
//! implementations. The HTTP implementation lives in `src/platform/`.

use crate::constants::Endpoint;
use crate::models::WireForm;
use crate::utils::RiscoError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Raw response from a remote endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json(&self, endpoint: Endpoint) -> Result<Value, RiscoError> {
        serde_json::from_str(&self.body).map_err(|e| RiscoError::RemoteProtocol {
            endpoint: endpoint.name().to_string(),
            details: format!("invalid JSON: {}", e),
        })
    }

    /// The remote `error` flag, or `None` when the body is not JSON
    ///
    /// A JSON body without the flag counts as `0` (no error).
    pub fn error_code(&self) -> Option<i64> {
        let body: Value = serde_json::from_str(&self.body).ok()?;
        Some(error_flag(&body))
    }
}

/// Read the `error` flag out of a decoded body (0 when absent)
///
/// The flag is usually a number but some endpoints send it as a string.
pub fn error_flag(body: &Value) -> i64 {
    match body.get("error") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(1),
        Some(Value::Bool(b)) => i64::from(*b),
        Some(_) => 1,
    }
}

/// One open connection to the cloud, with its cookie jar
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// POST a form body to an endpoint
    async fn post_form(
        &self,
        endpoint: Endpoint,
        form: &WireForm,
    ) -> Result<RemoteResponse, RiscoError>;

    /// Expiry of the session cookie, if the cloud has issued one
    fn session_expiry(&self) -> Option<DateTime<Utc>>;

    /// Release the connection. Further posts fail.
    async fn close(&self);
}

/// Opens fresh transports for (re-)authentication
pub trait TransportFactory: Send + Sync {
    type Transport: CloudTransport;

    fn open(&self) -> Result<Self::Transport, RiscoError>;
}

/// Observed session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Valid,
    Expired,
}

/// Holds the live transport and answers whether it is still usable
///
/// Owned by the session manager; at most one transport is live at a time.
pub struct SessionStore<T> {
    transport: Option<T>,
    state: SessionState,
}

impl<T: CloudTransport> SessionStore<T> {
    pub fn new() -> Self {
        Self {
            transport: None,
            state: SessionState::NoSession,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Install a freshly authenticated transport, closing the previous one
    pub async fn replace(&mut self, transport: T) {
        self.release().await;
        self.transport = Some(transport);
        self.state = SessionState::Valid;
    }

    /// Close and drop the current transport
    pub async fn release(&mut self) {
        if let Some(old) = self.transport.take() {
            debug!("Closing cloud session");
            old.close().await;
        }
        self.state = SessionState::NoSession;
    }

    /// Record a failed login; there is no usable transport until the next one
    pub fn mark_expired(&mut self) {
        self.state = SessionState::Expired;
    }

    /// Whether the session must be re-established before use
    ///
    /// Expired when there is no session cookie, when the cookie's expiry has
    /// passed, or when the liveness probe fails in any way.
    pub async fn is_expired(&mut self) -> bool {
        let Some(transport) = self.transport.as_ref() else {
            return true;
        };

        let expired = match transport.session_expiry() {
            None => {
                debug!("No session cookie present");
                true
            }
            Some(expires) if Utc::now() > expires => {
                debug!(%expires, "Session cookie expired");
                true
            }
            Some(_) => !probe_liveness(transport).await,
        };

        self.state = if expired {
            SessionState::Expired
        } else {
            SessionState::Valid
        };
        debug!(expired, "Session check");
        expired
    }
}

impl<T: CloudTransport> Default for SessionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ask the cloud whether the user session is still alive
async fn probe_liveness<T: CloudTransport>(transport: &T) -> bool {
    match transport.post_form(Endpoint::CpState, &WireForm::new()).await {
        Ok(resp) if resp.is_success() => match resp.error_code() {
            Some(0) => true,
            Some(code) => {
                debug!(code, "Liveness probe reported error");
                false
            }
            None => {
                debug!("Liveness probe returned a non-JSON body");
                false
            }
        },
        Ok(resp) => {
            debug!(status = resp.status, "Liveness probe failed");
            false
        }
        Err(err) => {
            debug!(error = %err, "Liveness probe transport error");
            false
        }
    }
}
