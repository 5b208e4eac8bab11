//! HTTP transport for the Risco cloud
//!
//! One [`HttpTransport`] wraps one `reqwest` client and its cookie jar, so
//! dropping the transport drops the session. Certificate verification is
//! off: the cloud is deployed with a certificate chain that standard roots
//! do not accept.

use crate::constants::{Endpoint, SESSION_COOKIE_NAME};
use crate::core::session::{CloudTransport, RemoteResponse, TransportFactory};
use crate::models::WireForm;
use crate::utils::RiscoError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cookie::Cookie;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Opens [`HttpTransport`]s against one base URL
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    base_url: String,
    request_timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TransportFactory for HttpTransportFactory {
    type Transport = HttpTransport;

    fn open(&self) -> Result<HttpTransport, RiscoError> {
        let jar = Arc::new(SessionJar::new(SESSION_COOKIE_NAME));
        let client = reqwest::Client::builder()
            .user_agent(format!("risco-cloud/{}", env!("CARGO_PKG_VERSION")))
            .cookie_provider(Arc::clone(&jar))
            .danger_accept_invalid_certs(true)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| RiscoError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            base_url: self.base_url.clone(),
            jar,
            closed: AtomicBool::new(false),
        })
    }
}

/// Cookie jar that also remembers when the session cookie expires
///
/// `reqwest` hands every response to the store, redirect hops included, so
/// a session cookie set on the login redirect is seen here.
struct SessionJar {
    inner: Jar,
    name: &'static str,
    expiry: Mutex<Option<DateTime<Utc>>>,
}

impl SessionJar {
    fn new(name: &'static str) -> Self {
        Self {
            inner: Jar::default(),
            name,
            expiry: Mutex::new(None),
        }
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry.lock().ok().and_then(|slot| *slot)
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.expiry.lock() {
            *slot = None;
        }
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<&HeaderValue> = cookie_headers.collect();
        let now = Utc::now();
        for raw in headers.iter().filter_map(|h| h.to_str().ok()) {
            if let Some(expires) = session_cookie_expiry(raw, self.name, now) {
                debug!(%expires, "Session cookie updated");
                if let Ok(mut slot) = self.expiry.lock() {
                    *slot = Some(expires);
                }
            }
        }
        self.inner.set_cookies(&mut headers.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    jar: Arc<SessionJar>,
    closed: AtomicBool,
}

#[async_trait]
impl CloudTransport for HttpTransport {
    async fn post_form(
        &self,
        endpoint: Endpoint,
        form: &WireForm,
    ) -> Result<RemoteResponse, RiscoError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RiscoError::Transport("session closed".to_string()));
        }

        let url = format!("{}{}", self.base_url, endpoint.path());
        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                RiscoError::Transport(format!("{} request failed: {}", endpoint.name(), e))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            RiscoError::Transport(format!("{} body read failed: {}", endpoint.name(), e))
        })?;

        debug!(endpoint = endpoint.name(), status, bytes = body.len(), "Response received");
        Ok(RemoteResponse { status, body })
    }

    fn session_expiry(&self) -> Option<DateTime<Utc>> {
        self.jar.expiry()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.jar.clear();
    }
}

/// Expiry set by a `Set-Cookie` header, if the header sets cookie `name`
///
/// `Max-Age` takes precedence over `Expires`, as browsers do. A cookie with
/// neither, or with an expiry past what a timestamp can hold, maps to
/// [`DateTime::<Utc>::MAX_UTC`]: it lives until the liveness probe says
/// otherwise.
pub fn session_cookie_expiry(raw: &str, name: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let cookie = Cookie::parse(raw).ok()?;
    if cookie.name() != name {
        return None;
    }

    let expires = match cookie.max_age() {
        Some(max_age) => TimeDelta::try_seconds(max_age.whole_seconds())
            .and_then(|delta| now.checked_add_signed(delta)),
        None => cookie
            .expires_datetime()
            .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), 0)),
    };
    Some(expires.unwrap_or(DateTime::<Utc>::MAX_UTC))
}
