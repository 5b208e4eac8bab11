//! Mock cloud transport for testing without the real service
//!
//! A [`MockCloud`] holds a script of canned replies per endpoint plus a log of
//! every call made. Transports opened from it share the script, so tests can
//! count authentications, probes and commands across session replacement.

use super::session::{CloudTransport, RemoteResponse, TransportFactory};
use crate::constants::Endpoint;
use crate::models::WireForm;
use crate::utils::RiscoError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Canned reply for one call
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(RemoteResponse),
    /// Simulated network failure
    Fail(String),
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        MockReply::Respond(RemoteResponse::new(status, body))
    }
}

pub const DISARMED_OVERVIEW: &str =
    r#"{"overview":{"partInfo":{"armedStr":"No","disarmedStr":"Yes","partarmedStr":"No"}}}"#;
pub const QUIET_CP_STATE: &str = r#"{"error":0,"OngoingAlarm":false}"#;

struct Script {
    queued: HashMap<Endpoint, VecDeque<MockReply>>,
    defaults: HashMap<Endpoint, MockReply>,
    calls: Vec<(Endpoint, WireForm)>,
    cookie_lifetime: Option<Duration>,
    opened: usize,
    closed: usize,
}

impl Script {
    fn next_reply(&mut self, endpoint: Endpoint) -> MockReply {
        if let Some(reply) = self.queued.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.defaults
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| MockReply::json(404, "not found"))
    }

    fn cookie_expiry(&self) -> Option<DateTime<Utc>> {
        self.cookie_lifetime.map(|lifetime| Utc::now() + lifetime)
    }
}

/// Scripted stand-in for the remote service
#[derive(Clone)]
pub struct MockCloud {
    script: Arc<Mutex<Script>>,
}

impl MockCloud {
    /// A healthy cloud: logins succeed, the panel is disarmed and quiet
    pub fn new() -> Self {
        let defaults = HashMap::from([
            (Endpoint::Auth, MockReply::json(200, r#"{"error":0}"#)),
            (Endpoint::SiteLogin, MockReply::json(200, r#"{"error":0}"#)),
            (Endpoint::CpState, MockReply::json(200, QUIET_CP_STATE)),
            (Endpoint::Overview, MockReply::json(200, DISARMED_OVERVIEW)),
            (Endpoint::ArmDisarm, MockReply::json(200, r#"{"error":0}"#)),
        ]);

        Self {
            script: Arc::new(Mutex::new(Script {
                queued: HashMap::new(),
                defaults,
                calls: Vec::new(),
                cookie_lifetime: Some(Duration::hours(1)),
                opened: 0,
                closed: 0,
            })),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Queue a one-shot reply, used before the endpoint's default
    pub fn push(&self, endpoint: Endpoint, reply: MockReply) {
        self.script()
            .queued
            .entry(endpoint)
            .or_default()
            .push_back(reply);
    }

    /// Replace the reply used once the queue for `endpoint` is empty
    pub fn set_default(&self, endpoint: Endpoint, reply: MockReply) {
        self.script().defaults.insert(endpoint, reply);
    }

    /// Lifetime of the cookie issued on login; `None` issues no cookie
    pub fn set_cookie_lifetime(&self, lifetime: Option<Duration>) {
        self.script().cookie_lifetime = lifetime;
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .count()
    }

    pub fn forms(&self, endpoint: Endpoint) -> Vec<WireForm> {
        self.script()
            .calls
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, form)| form.clone())
            .collect()
    }

    /// Every call in order
    pub fn call_log(&self) -> Vec<Endpoint> {
        self.script().calls.iter().map(|(e, _)| *e).collect()
    }

    pub fn opened(&self) -> usize {
        self.script().opened
    }

    pub fn closed(&self) -> usize {
        self.script().closed
    }

    pub fn factory(&self) -> MockFactory {
        MockFactory {
            cloud: self.clone(),
        }
    }

    fn open_transport(&self, expiry: Option<DateTime<Utc>>) -> MockTransport {
        self.script().opened += 1;
        MockTransport {
            cloud: self.clone(),
            expiry: Mutex::new(expiry),
            closed: AtomicBool::new(false),
        }
    }

    /// A transport that already holds a session cookie, skipping login
    pub fn authenticated_transport(&self) -> MockTransport {
        let expiry = self.script().cookie_expiry();
        self.open_transport(expiry)
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockTransport {
    cloud: MockCloud,
    expiry: Mutex<Option<DateTime<Utc>>>,
    closed: AtomicBool,
}

#[async_trait]
impl CloudTransport for MockTransport {
    async fn post_form(
        &self,
        endpoint: Endpoint,
        form: &WireForm,
    ) -> Result<RemoteResponse, RiscoError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RiscoError::Transport("session closed".to_string()));
        }

        let (reply, cookie) = {
            let mut script = self.cloud.script();
            script.calls.push((endpoint, form.clone()));
            (script.next_reply(endpoint), script.cookie_expiry())
        };

        match reply {
            MockReply::Fail(msg) => Err(RiscoError::Transport(msg)),
            MockReply::Respond(resp) => {
                let accepted = resp.is_success() && resp.error_code().unwrap_or(0) == 0;
                if endpoint == Endpoint::Auth && accepted {
                    *self.expiry.lock().unwrap() = cookie;
                }
                Ok(resp)
            }
        }
    }

    fn session_expiry(&self) -> Option<DateTime<Utc>> {
        *self.expiry.lock().unwrap()
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cloud.script().closed += 1;
        }
    }
}

pub struct MockFactory {
    cloud: MockCloud,
}

impl TransportFactory for MockFactory {
    type Transport = MockTransport;

    fn open(&self) -> Result<MockTransport, RiscoError> {
        Ok(self.cloud.open_transport(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_sets_cookie() {
        let cloud = MockCloud::new();
        let transport = cloud.factory().open().unwrap();
        assert!(transport.session_expiry().is_none());

        transport.post_form(Endpoint::Auth, &WireForm::new()).await.unwrap();
        assert!(transport.session_expiry().is_some());
    }

    #[tokio::test]
    async fn test_rejected_login_sets_no_cookie() {
        let cloud = MockCloud::new();
        cloud.push(Endpoint::Auth, MockReply::json(200, r#"{"error":5}"#));
        let transport = cloud.factory().open().unwrap();

        transport.post_form(Endpoint::Auth, &WireForm::new()).await.unwrap();
        assert!(transport.session_expiry().is_none());
    }

    #[tokio::test]
    async fn test_queued_reply_precedes_default() {
        let cloud = MockCloud::new();
        cloud.push(Endpoint::Overview, MockReply::Fail("timeout".to_string()));
        let transport = cloud.authenticated_transport();

        assert!(transport.post_form(Endpoint::Overview, &WireForm::new()).await.is_err());
        assert!(transport.post_form(Endpoint::Overview, &WireForm::new()).await.is_ok());
        assert_eq!(cloud.calls(Endpoint::Overview), 2);
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_calls() {
        let cloud = MockCloud::new();
        let transport = cloud.authenticated_transport();
        transport.close().await;
        transport.close().await;

        assert!(transport.post_form(Endpoint::CpState, &WireForm::new()).await.is_err());
        assert_eq!(cloud.closed(), 1);
        assert_eq!(cloud.calls(Endpoint::CpState), 0);
    }
}
