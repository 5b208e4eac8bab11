//! Cloud session manager
//!
//! Sole owner of the [`SessionStore`]. Every remote call goes through
//! [`CloudSessionManager::authenticated_post`], which confirms the session is
//! alive (logging in again if not) before sending the request. [`call`]
//! wraps that in the retry executor.
//!
//! # State machine
//!
//! ```text
//! NoSession --login ok--> Valid --cookie passed / probe failed--> Expired
//!                                                                 |
//!              Valid <-------------------login ok-----------------+
//! ```
//!
//! A failed login leaves the manager in `Expired`; the error surfaces once
//! the retry policy gives up. The manager is reusable after `close()`.
//!
//! Only [`ensure_authenticated`] retries the login on its own. Inside
//! [`call`] a login failure is one failed attempt of the surrounding retry
//! loop, so `max_retries` bounds the total number of logins.
//!
//! [`call`]: CloudSessionManager::call
//! [`ensure_authenticated`]: CloudSessionManager::ensure_authenticated

use super::session::{
    CloudTransport, RemoteResponse, SessionState, SessionStore, TransportFactory,
};
use crate::constants::Endpoint;
use crate::models::{PinCredential, UserCredential, WireForm};
use crate::utils::{retry_with_backoff, RetryConfig, RiscoError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tunables for a session manager
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub retry: RetryConfig,
    /// Send the pin to `SiteLogin` after each successful login
    pub site_login: bool,
}

pub struct CloudSessionManager<F: TransportFactory> {
    factory: F,
    user: UserCredential,
    pin: Option<PinCredential>,
    config: ManagerConfig,
    /// Held across each ensure-then-call sequence
    call_lock: Mutex<()>,
    store: Mutex<SessionStore<F::Transport>>,
    auth_count: AtomicU64,
}

impl<F: TransportFactory> CloudSessionManager<F> {
    pub fn new(
        factory: F,
        user: UserCredential,
        pin: Option<PinCredential>,
        config: ManagerConfig,
    ) -> Self {
        debug!(
            user = %user.username(),
            site_login = config.site_login,
            "Setting up cloud session manager"
        );
        Self {
            factory,
            user,
            pin,
            config,
            call_lock: Mutex::new(()),
            store: Mutex::new(SessionStore::new()),
            auth_count: AtomicU64::new(0),
        }
    }

    /// State as of the last check
    pub async fn session_state(&self) -> SessionState {
        self.store.lock().await.state()
    }

    /// Number of login attempts made so far
    pub fn auth_count(&self) -> u64 {
        self.auth_count.load(Ordering::SeqCst)
    }

    /// Whether the current session must be replaced before use
    pub async fn is_expired(&self) -> bool {
        let _guard = self.call_lock.lock().await;
        self.store.lock().await.is_expired().await
    }

    /// Log in unless the current session is confirmed alive. Idempotent.
    pub async fn ensure_authenticated(&self) -> Result<(), RiscoError> {
        let _guard = self.call_lock.lock().await;
        if !self.store.lock().await.is_expired().await {
            return Ok(());
        }

        retry_with_backoff(
            self.config.retry.clone(),
            || self.authenticate_once(),
            RiscoError::is_retryable,
        )
        .await
    }

    /// Ensure a live session, then POST `form` to `endpoint` on it
    ///
    /// Makes at most one login attempt. Returns the raw response; status and
    /// body checks are the caller's.
    pub async fn authenticated_post(
        &self,
        endpoint: Endpoint,
        form: WireForm,
    ) -> Result<RemoteResponse, RiscoError> {
        let _guard = self.call_lock.lock().await;
        if self.store.lock().await.is_expired().await {
            self.authenticate_once().await?;
        }

        let store = self.store.lock().await;
        let transport = store.transport().ok_or(RiscoError::SessionExpired)?;
        debug!(endpoint = endpoint.name(), "Hitting endpoint");
        transport.post_form(endpoint, &form).await
    }

    /// [`authenticated_post`](Self::authenticated_post) under the retry policy
    ///
    /// `validate` turns the raw response into the caller's result. Its errors
    /// go through the same retryability check as transport errors.
    pub async fn call<T, V>(
        &self,
        endpoint: Endpoint,
        form: WireForm,
        validate: V,
    ) -> Result<T, RiscoError>
    where
        V: Fn(RemoteResponse) -> Result<T, RiscoError>,
    {
        let validate = &validate;
        let form = &form;
        retry_with_backoff(
            self.config.retry.clone(),
            move || async move {
                let resp = self.authenticated_post(endpoint, form.clone()).await?;
                validate(resp)
            },
            RiscoError::is_retryable,
        )
        .await
    }

    /// Release the session. The manager can log in again afterwards.
    pub async fn close(&self) {
        let _guard = self.call_lock.lock().await;
        self.store.lock().await.release().await;
    }

    /// Run `f` against this manager and close the session afterwards,
    /// whatever `f` returned
    pub async fn run_scoped<R, Fut, Op>(self, f: Op) -> R
    where
        Op: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = R>,
    {
        let manager = Arc::new(self);
        let result = f(Arc::clone(&manager)).await;
        manager.close().await;
        result
    }

    /// Replace the session with a freshly logged-in one
    ///
    /// Caller must hold `call_lock`. The old transport is closed first; a
    /// transport whose login fails is closed before the error is returned.
    async fn authenticate_once(&self) -> Result<(), RiscoError> {
        let mut store = self.store.lock().await;
        store.release().await;

        let transport = match self.factory.open() {
            Ok(transport) => transport,
            Err(err) => {
                store.mark_expired();
                return Err(err);
            }
        };
        self.auth_count.fetch_add(1, Ordering::SeqCst);
        info!(user = %self.user.username(), "Logging in to Risco cloud");

        match self.login(&transport).await {
            Ok(()) => {
                store.replace(transport).await;
                info!("Cloud session established");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                transport.close().await;
                store.mark_expired();
                Err(err)
            }
        }
    }

    async fn login(&self, transport: &F::Transport) -> Result<(), RiscoError> {
        let resp = transport
            .post_form(Endpoint::Auth, &self.user.to_wire_format())
            .await?;
        check_auth_response(Endpoint::Auth, &resp)?;

        if transport.session_expiry().is_none() {
            return Err(RiscoError::Auth("no session cookie issued".to_string()));
        }

        if self.config.site_login {
            let pin = self.pin.as_ref().ok_or_else(|| {
                RiscoError::Auth("site login enabled but no pin configured".to_string())
            })?;
            debug!("Selecting site with pin");
            let resp = transport
                .post_form(Endpoint::SiteLogin, &pin.to_wire_format())
                .await?;
            check_auth_response(Endpoint::SiteLogin, &resp)?;
        }

        Ok(())
    }
}

/// A login step fails on non-2xx or a non-zero `error` flag
///
/// Non-JSON bodies are accepted; the login page answers with HTML.
fn check_auth_response(endpoint: Endpoint, resp: &RemoteResponse) -> Result<(), RiscoError> {
    if !resp.is_success() {
        return Err(RiscoError::Auth(format!(
            "{} returned HTTP {}",
            endpoint.name(),
            resp.status
        )));
    }
    match resp.error_code() {
        Some(code) if code != 0 => Err(RiscoError::Auth(format!(
            "{} reported error {}",
            endpoint.name(),
            code
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::mock_transport::{MockCloud, MockFactory, MockReply};
    use crate::models::{SecureString, Username};
    use std::time::Duration;

    pub(crate) fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: Some(3),
            max_elapsed: None,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        }
    }

    pub(crate) fn test_user() -> UserCredential {
        UserCredential::new(Username::new("u").unwrap(), SecureString::new("p"))
    }

    pub(crate) fn test_manager(cloud: &MockCloud) -> CloudSessionManager<MockFactory> {
        CloudSessionManager::new(
            cloud.factory(),
            test_user(),
            None,
            ManagerConfig {
                retry: fast_retry(),
                site_login: false,
            },
        )
    }

    #[tokio::test]
    async fn test_starts_without_session() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);

        assert_eq!(manager.session_state().await, SessionState::NoSession);
        assert!(manager.is_expired().await);
        assert_eq!(cloud.calls(Endpoint::CpState), 0);
    }

    #[tokio::test]
    async fn test_ensure_authenticated_is_idempotent() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);

        manager.ensure_authenticated().await.unwrap();
        manager.ensure_authenticated().await.unwrap();

        assert_eq!(cloud.calls(Endpoint::Auth), 1);
        assert_eq!(manager.auth_count(), 1);
        assert_eq!(manager.session_state().await, SessionState::Valid);
    }

    #[tokio::test]
    async fn test_login_sends_user_credentials() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);
        manager.ensure_authenticated().await.unwrap();

        let forms = cloud.forms(Endpoint::Auth);
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].get("username"), Some("u"));
        assert_eq!(forms[0].get("password"), Some("p"));
        assert_eq!(cloud.calls(Endpoint::SiteLogin), 0);
    }

    #[tokio::test]
    async fn test_failed_probe_triggers_reauthentication() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);
        manager.ensure_authenticated().await.unwrap();

        cloud.push(Endpoint::CpState, MockReply::Fail("connection reset".to_string()));
        manager.ensure_authenticated().await.unwrap();

        assert_eq!(cloud.calls(Endpoint::Auth), 2);
        // the replaced session was closed
        assert_eq!(cloud.closed(), 1);
        assert_eq!(cloud.opened(), 2);
    }

    #[tokio::test]
    async fn test_expired_cookie_triggers_reauthentication() {
        let cloud = MockCloud::new();
        cloud.set_cookie_lifetime(Some(chrono::Duration::seconds(-1)));
        let manager = test_manager(&cloud);
        manager.ensure_authenticated().await.unwrap();

        cloud.set_cookie_lifetime(Some(chrono::Duration::hours(1)));
        manager.ensure_authenticated().await.unwrap();
        manager.ensure_authenticated().await.unwrap();

        assert_eq!(cloud.calls(Endpoint::Auth), 2);
    }

    #[tokio::test]
    async fn test_transient_login_failures_are_retried() {
        let cloud = MockCloud::new();
        cloud.push(Endpoint::Auth, MockReply::Fail("timeout".to_string()));
        cloud.push(Endpoint::Auth, MockReply::json(503, "busy"));
        let manager = test_manager(&cloud);

        manager.ensure_authenticated().await.unwrap();

        assert_eq!(cloud.calls(Endpoint::Auth), 3);
        // both failed transports were released
        assert_eq!(cloud.closed(), 2);
        assert_eq!(manager.session_state().await, SessionState::Valid);
    }

    #[tokio::test]
    async fn test_rejected_credentials_surface_after_retries() {
        let cloud = MockCloud::new();
        cloud.set_default(Endpoint::Auth, MockReply::json(200, r#"{"error":3}"#));
        let manager = test_manager(&cloud);

        let err = manager.ensure_authenticated().await.unwrap_err();

        assert!(matches!(err, RiscoError::Auth(_)));
        // initial attempt + 3 retries
        assert_eq!(cloud.calls(Endpoint::Auth), 4);
        assert_eq!(cloud.opened(), cloud.closed());
        assert_eq!(manager.session_state().await, SessionState::Expired);
    }

    #[tokio::test]
    async fn test_failed_relogin_stays_expired() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);
        manager.ensure_authenticated().await.unwrap();

        cloud.push(Endpoint::CpState, MockReply::Fail("connection reset".to_string()));
        cloud.set_default(Endpoint::Auth, MockReply::json(503, "busy"));
        assert!(manager.ensure_authenticated().await.is_err());

        assert_eq!(manager.session_state().await, SessionState::Expired);
        assert!(manager.is_expired().await);
    }

    #[tokio::test]
    async fn test_retry_limit_bounds_logins_inside_calls() {
        let cloud = MockCloud::new();
        cloud.set_default(Endpoint::Auth, MockReply::json(200, r#"{"error":3}"#));
        let manager = test_manager(&cloud);

        let err = manager.get_arm_status().await.unwrap_err();

        assert!(matches!(err, RiscoError::Auth(_)));
        // initial attempt + 3 retries, one login each
        assert_eq!(cloud.calls(Endpoint::Auth), 4);
        assert_eq!(cloud.calls(Endpoint::Overview), 0);
    }

    #[tokio::test]
    async fn test_authenticated_post_makes_one_login_attempt() {
        let cloud = MockCloud::new();
        cloud.set_default(Endpoint::Auth, MockReply::Fail("timeout".to_string()));
        let manager = test_manager(&cloud);

        let err = manager
            .authenticated_post(Endpoint::Overview, WireForm::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RiscoError::Transport(_)));
        assert_eq!(cloud.calls(Endpoint::Auth), 1);
    }

    #[tokio::test]
    async fn test_login_without_cookie_fails() {
        let cloud = MockCloud::new();
        cloud.set_cookie_lifetime(None);
        let manager = CloudSessionManager::new(
            cloud.factory(),
            test_user(),
            None,
            ManagerConfig {
                retry: RetryConfig::no_retry(),
                site_login: false,
            },
        );

        let err = manager.ensure_authenticated().await.unwrap_err();
        assert!(err.to_string().contains("no session cookie"));
    }

    #[tokio::test]
    async fn test_site_login_sends_pin() {
        let cloud = MockCloud::new();
        let manager = CloudSessionManager::new(
            cloud.factory(),
            test_user(),
            Some(PinCredential::new(SecureString::new("1234"))),
            ManagerConfig {
                retry: fast_retry(),
                site_login: true,
            },
        );

        manager.ensure_authenticated().await.unwrap();

        assert_eq!(cloud.call_log()[..2], [Endpoint::Auth, Endpoint::SiteLogin]);
        let forms = cloud.forms(Endpoint::SiteLogin);
        assert_eq!(forms[0].get("Pin"), Some("1234"));
    }

    #[tokio::test]
    async fn test_site_login_rejection_fails_login() {
        let cloud = MockCloud::new();
        cloud.set_default(Endpoint::SiteLogin, MockReply::json(200, r#"{"error":1}"#));
        let manager = CloudSessionManager::new(
            cloud.factory(),
            test_user(),
            Some(PinCredential::new(SecureString::new("0000"))),
            ManagerConfig {
                retry: RetryConfig::no_retry(),
                site_login: true,
            },
        );

        let err = manager.ensure_authenticated().await.unwrap_err();
        assert!(matches!(err, RiscoError::Auth(_)));
        assert_eq!(cloud.closed(), 1);
    }

    #[tokio::test]
    async fn test_site_login_without_pin_fails() {
        let cloud = MockCloud::new();
        let manager = CloudSessionManager::new(
            cloud.factory(),
            test_user(),
            None,
            ManagerConfig {
                retry: RetryConfig::no_retry(),
                site_login: true,
            },
        );

        assert!(manager.ensure_authenticated().await.is_err());
    }

    #[tokio::test]
    async fn test_call_retries_http_failures() {
        let cloud = MockCloud::new();
        cloud.push(Endpoint::Overview, MockReply::json(500, "oops"));
        let manager = test_manager(&cloud);

        let status = manager
            .call(Endpoint::Overview, WireForm::new(), |resp| {
                if resp.is_success() {
                    Ok(resp.status)
                } else {
                    Err(RiscoError::HttpStatus {
                        endpoint: "Overview/Get".to_string(),
                        status: resp.status,
                    })
                }
            })
            .await
            .unwrap();

        assert_eq!(status, 200);
        assert_eq!(cloud.calls(Endpoint::Overview), 2);
        assert_eq!(cloud.calls(Endpoint::Auth), 1);
    }

    #[tokio::test]
    async fn test_close_releases_and_allows_relogin() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);
        manager.ensure_authenticated().await.unwrap();

        manager.close().await;
        assert_eq!(manager.session_state().await, SessionState::NoSession);
        assert_eq!(cloud.closed(), 1);

        manager.ensure_authenticated().await.unwrap();
        assert_eq!(cloud.calls(Endpoint::Auth), 2);
    }

    #[tokio::test]
    async fn test_run_scoped_closes_on_error() {
        let cloud = MockCloud::new();
        let manager = test_manager(&cloud);

        let result: Result<(), RiscoError> = manager
            .run_scoped(|m| async move {
                m.ensure_authenticated().await?;
                Err(RiscoError::SessionExpired)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cloud.opened(), 1);
        assert_eq!(cloud.closed(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let cloud = MockCloud::new();
        let manager = Arc::new(test_manager(&cloud));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.ensure_authenticated().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cloud.calls(Endpoint::Auth), 1);
        assert_eq!(cloud.opened(), 1);
    }
}
