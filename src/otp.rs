// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # OTP Verification Flow
//!
//! Second factor that gates a password login. The session opened by
//! [`ApiClient::login`](crate::api::ApiClient::login) only becomes
//! authenticated when this flow reaches `Verified`.
//!
//! ## States
//!
//! ```text
//!            verify()              envelope success
//!  Issued ───────────► Verifying ─────────────────► Verified  (navigate Dashboard, once)
//!    ▲                    │
//!    │ transport error    │ envelope rejection / 401
//!    └────────────────────┤
//!    ▲                    ▼
//!    └──── resend() ──── Failed
//!
//!  Issued | Verifying | Failed ── close() / change_number() ──► Abandoned (session cleared)
//! ```
//!
//! A failed verification never navigates. `close()` goes back and
//! `change_number()` goes to login; neither goes to the dashboard.
//!
//! Resends are rate limited by a cooldown measured from the last send.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::envelope::ApiResponse;
use crate::error::ClientError;
use crate::navigation::{Navigator, Route};
use crate::session::SessionManager;

/// Digits in a one-time password.
pub const OTP_LENGTH: usize = 6;

/// OTP category used by the login flow.
pub const LOGIN_CATEGORY: &str = "login";

const USER_NOT_FOUND_MESSAGE: &str = "User not found. Please check your mobile number.";
const USER_ALREADY_REGISTERED_MESSAGE: &str = "User already registered.";

/// Backend calls the flow depends on.
pub trait OtpGateway: Send + Sync {
    fn send_otp(
        &self,
        mobile: &str,
        category: &str,
    ) -> impl Future<Output = Result<ApiResponse, ClientError>> + Send;

    fn verify_otp(
        &self,
        mobile: &str,
        category: &str,
        otp: &str,
    ) -> impl Future<Output = Result<ApiResponse, ClientError>> + Send;
}

/// The challenge handed out at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub mobile: String,
    pub category: String,
    /// When the current OTP was sent; starts the resend cooldown.
    pub issued_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn login(mobile: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            mobile: mobile.into(),
            category: LOGIN_CATEGORY.to_string(),
            issued_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpState {
    Issued,
    Verifying,
    Verified,
    Failed { message: String },
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// The backend refused the code.
    Rejected { message: String },
    /// Another verify is in flight, or the challenge is already closed.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    /// A send is already in flight, or the challenge is closed.
    Ignored,
}

struct Inner {
    state: OtpState,
    last_sent_at: DateTime<Utc>,
    resending: bool,
}

pub struct OtpFlow<G> {
    gateway: G,
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    mobile: String,
    category: String,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl<G: OtpGateway> OtpFlow<G> {
    pub fn new(
        gateway: G,
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        challenge: OtpChallenge,
        cooldown: Duration,
    ) -> Self {
        Self {
            gateway,
            session,
            navigator,
            clock,
            mobile: challenge.mobile,
            category: challenge.category,
            cooldown,
            inner: Mutex::new(Inner {
                state: OtpState::Issued,
                last_sent_at: challenge.issued_at,
                resending: false,
            }),
        }
    }

    pub fn state(&self) -> OtpState {
        self.lock().state.clone()
    }

    pub fn mobile(&self) -> &str {
        &self.mobile
    }

    /// Seconds until a resend is allowed, rounded up.
    pub fn cooldown_remaining(&self) -> u64 {
        let last_sent_at = self.lock().last_sent_at;
        self.remaining_after(last_sent_at)
    }

    fn remaining_after(&self, last_sent_at: DateTime<Utc>) -> u64 {
        let elapsed = self.clock.now().signed_duration_since(last_sent_at);
        let elapsed_ms = elapsed.num_milliseconds().max(0) as u128;
        let cooldown_ms = self.cooldown.as_millis();
        if elapsed_ms >= cooldown_ms {
            0
        } else {
            let left = cooldown_ms - elapsed_ms;
            left.div_ceil(1000) as u64
        }
    }

    /// Submit `otp`. Only envelope success moves to `Verified` and navigates.
    pub async fn verify(&self, otp: &str) -> Result<VerifyOutcome, ClientError> {
        let otp = otp.trim();
        if otp.len() != OTP_LENGTH || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(ClientError::validation(
                "otp",
                format!("Enter the {OTP_LENGTH}-digit OTP."),
            ));
        }

        let previous = {
            let mut inner = self.lock();
            if !matches!(inner.state, OtpState::Issued | OtpState::Failed { .. }) {
                return Ok(VerifyOutcome::Ignored);
            }
            std::mem::replace(&mut inner.state, OtpState::Verifying)
        };
        let restore = VerifyingFlag {
            flow: self,
            previous,
        };

        let result = self.gateway.verify_otp(&self.mobile, &self.category, otp).await;

        let mut inner = self.lock();
        if inner.state != OtpState::Verifying {
            // Closed while the request was in flight; its result no longer applies.
            return Err(ClientError::Cancelled);
        }

        match result {
            Ok(response) if response.is_success() => {
                if let Err(e) = self.session.complete_otp(self.clock.now()) {
                    inner.state = OtpState::Failed {
                        message: e.user_message(),
                    };
                    return Err(e);
                }
                inner.state = OtpState::Verified;
                drop(inner);
                info!(mobile = %self.mobile, "OTP verified");
                self.navigator.replace(Route::Dashboard);
                Ok(VerifyOutcome::Verified)
            }
            Ok(response) if response.is_unauthorized() => {
                warn!(mobile = %self.mobile, "OTP verification rejected the session");
                inner.state = OtpState::Failed {
                    message: ClientError::AuthExpired.user_message(),
                };
                drop(inner);
                self.session.invalidate()?;
                Err(ClientError::AuthExpired)
            }
            Ok(response) => {
                let message = response
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "OTP verification failed!".to_string());
                warn!(mobile = %self.mobile, "OTP rejected");
                inner.state = OtpState::Failed {
                    message: message.clone(),
                };
                Ok(VerifyOutcome::Rejected { message })
            }
            Err(ClientError::AuthExpired) => {
                inner.state = OtpState::Failed {
                    message: ClientError::AuthExpired.user_message(),
                };
                Err(ClientError::AuthExpired)
            }
            Err(ClientError::RequestFailed { status, message }) => {
                inner.state = OtpState::Failed {
                    message: message.clone(),
                };
                Err(ClientError::RequestFailed { status, message })
            }
            Err(e) => {
                inner.state = restore.previous.clone();
                Err(e)
            }
        }
    }

    /// Request a fresh OTP, subject to the cooldown.
    pub async fn resend(&self) -> Result<ResendOutcome, ClientError> {
        {
            let mut inner = self.lock();
            if !matches!(inner.state, OtpState::Issued | OtpState::Failed { .. })
                || inner.resending
            {
                return Ok(ResendOutcome::Ignored);
            }
            let remaining_secs = self.remaining_after(inner.last_sent_at);
            if remaining_secs > 0 {
                return Err(ClientError::CooldownActive { remaining_secs });
            }
            inner.resending = true;
        }
        let _resending = ResendingFlag { flow: self };

        let result = self.gateway.send_otp(&self.mobile, &self.category).await;

        let mut inner = self.lock();
        inner.resending = false;
        if inner.state == OtpState::Abandoned {
            return Err(ClientError::Cancelled);
        }

        let response = result.map_err(friendly_send_error)?;
        if !response.is_success() {
            let status = response.status.unwrap_or_default();
            let message = response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Failed to resend OTP".to_string());
            return Err(friendly_send_error(ClientError::request_failed(
                status, message,
            )));
        }

        let sent_at = self.clock.now();
        inner.last_sent_at = sent_at;
        if matches!(inner.state, OtpState::Failed { .. }) {
            inner.state = OtpState::Issued;
        }
        drop(inner);
        if let Err(e) = self.session.record_otp_sent(sent_at) {
            warn!(error = %e, "Failed to persist OTP send time");
        }
        info!(mobile = %self.mobile, "OTP resent");
        Ok(ResendOutcome::Sent)
    }

    /// Dismiss the challenge and go back.
    pub fn close(&self) -> Result<(), ClientError> {
        self.abandon(Route::Back)
    }

    /// Abandon the challenge and return to login to enter another number.
    pub fn change_number(&self) -> Result<(), ClientError> {
        self.abandon(Route::Login)
    }

    fn abandon(&self, route: Route) -> Result<(), ClientError> {
        {
            let mut inner = self.lock();
            if matches!(inner.state, OtpState::Verified | OtpState::Abandoned) {
                return Ok(());
            }
            inner.state = OtpState::Abandoned;
        }
        info!(mobile = %self.mobile, route = route.path(), "OTP challenge abandoned");
        let cleared = self.session.abandon_challenge();
        self.navigator.replace(route);
        cleared
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Puts a verify that never finished (its future was dropped) back to the
/// state it started from.
struct VerifyingFlag<'a, G: OtpGateway> {
    flow: &'a OtpFlow<G>,
    previous: OtpState,
}

impl<G: OtpGateway> Drop for VerifyingFlag<'_, G> {
    fn drop(&mut self) {
        let mut inner = self.flow.lock();
        if inner.state == OtpState::Verifying {
            inner.state = std::mem::replace(&mut self.previous, OtpState::Issued);
        }
    }
}

struct ResendingFlag<'a, G: OtpGateway> {
    flow: &'a OtpFlow<G>,
}

impl<G: OtpGateway> Drop for ResendingFlag<'_, G> {
    fn drop(&mut self) {
        self.flow.lock().resending = false;
    }
}

/// Replace the backend's account-state messages with the ones the portal shows.
fn friendly_send_error(err: ClientError) -> ClientError {
    match err {
        ClientError::RequestFailed { status, message } => {
            let message = if message.contains("User not exists") {
                USER_NOT_FOUND_MESSAGE.to_string()
            } else if message.contains("User already exists") {
                USER_ALREADY_REGISTERED_MESSAGE.to_string()
            } else {
                message
            };
            ClientError::RequestFailed { status, message }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::navigation::RecordingNavigator;
    use crate::session::{test_grant, FileSessionStore};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CORRECT_OTP: &str = "000000";

    #[derive(Default)]
    struct ScriptedGateway {
        verify_replies: Mutex<VecDeque<Result<ApiResponse, ClientError>>>,
        send_replies: Mutex<VecDeque<Result<ApiResponse, ClientError>>>,
        verify_calls: AtomicUsize,
        send_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    fn ok() -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse {
            status: Some(200),
            ..Default::default()
        })
    }

    fn rejected(message: &str) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse {
            status: Some(400),
            message: Some(message.to_string()),
            ..Default::default()
        })
    }

    impl ScriptedGateway {
        fn verify_with(self, reply: Result<ApiResponse, ClientError>) -> Self {
            self.verify_replies.lock().unwrap().push_back(reply);
            self
        }

        fn send_with(self, reply: Result<ApiResponse, ClientError>) -> Self {
            self.send_replies.lock().unwrap().push_back(reply);
            self
        }
    }

    impl OtpGateway for Arc<ScriptedGateway> {
        async fn send_otp(&self, _mobile: &str, _category: &str) -> Result<ApiResponse, ClientError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.send_replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(ok)
        }

        async fn verify_otp(
            &self,
            _mobile: &str,
            _category: &str,
            _otp: &str,
        ) -> Result<ApiResponse, ClientError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.verify_replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(ok)
        }
    }

    struct Harness {
        flow: Arc<OtpFlow<Arc<ScriptedGateway>>>,
        gateway: Arc<ScriptedGateway>,
        session: SessionManager,
        navigator: Arc<RecordingNavigator>,
        clock: ManualClock,
    }

    fn harness(gateway: ScriptedGateway) -> Harness {
        let session = SessionManager::in_memory();
        let now = Utc::now();
        session.begin_login(test_grant("42"), now).unwrap();
        let gateway = Arc::new(gateway);
        let navigator = Arc::new(RecordingNavigator::new());
        let clock = ManualClock::new(now);
        let flow = OtpFlow::new(
            gateway.clone(),
            session.clone(),
            navigator.clone(),
            Arc::new(clock.clone()),
            OtpChallenge::login("9876543210", now),
            Duration::from_secs(30),
        );
        Harness {
            flow: Arc::new(flow),
            gateway,
            session,
            navigator,
            clock,
        }
    }

    #[tokio::test]
    async fn correct_otp_verifies_and_redirects_once() {
        let h = harness(ScriptedGateway::default());

        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(h.flow.state(), OtpState::Verified);
        assert!(h.session.is_authenticated());

        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Ignored);
        assert_eq!(h.navigator.routes(), vec![Route::Dashboard]);
    }

    #[tokio::test]
    async fn wrong_otp_fails_without_redirect() {
        let h = harness(ScriptedGateway::default().verify_with(rejected("Invalid OTP")));

        let outcome = h.flow.verify("123456").await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Rejected {
                message: "Invalid OTP".into()
            }
        );
        assert_eq!(
            h.flow.state(),
            OtpState::Failed {
                message: "Invalid OTP".into()
            }
        );
        assert!(h.navigator.routes().is_empty());
        assert!(!h.session.is_authenticated());

        // A retry from Failed may still succeed.
        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(h.navigator.count(Route::Dashboard), 1);
    }

    #[tokio::test]
    async fn malformed_otp_is_rejected_locally() {
        let h = harness(ScriptedGateway::default());
        for bad in ["", "12345", "1234567", "12a456"] {
            assert!(matches!(
                h.flow.verify(bad).await,
                Err(ClientError::Validation(_))
            ));
        }
        assert_eq!(h.flow.state(), OtpState::Issued);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_error_returns_to_issued() {
        let h = harness(
            ScriptedGateway::default()
                .verify_with(Err(ClientError::NetworkUnavailable("down".into()))),
        );
        let err = h.flow.verify(CORRECT_OTP).await.unwrap_err();
        assert!(matches!(err, ClientError::NetworkUnavailable(_)));
        assert_eq!(h.flow.state(), OtpState::Issued);
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn expired_session_fails_without_redirect() {
        let h = harness(ScriptedGateway::default().verify_with(Err(ClientError::AuthExpired)));
        assert_eq!(
            h.flow.verify(CORRECT_OTP).await.unwrap_err(),
            ClientError::AuthExpired
        );
        assert!(matches!(h.flow.state(), OtpState::Failed { .. }));
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_envelope_clears_session() {
        let h = harness(ScriptedGateway::default().verify_with(Ok(ApiResponse {
            status: Some(401),
            ..Default::default()
        })));
        assert_eq!(
            h.flow.verify(CORRECT_OTP).await.unwrap_err(),
            ClientError::AuthExpired
        );
        assert!(h.session.access_token().is_none());
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn concurrent_verify_makes_one_call() {
        let h = harness(ScriptedGateway {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });

        let first = {
            let flow = h.flow.clone();
            tokio::spawn(async move { flow.verify(CORRECT_OTP).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Ignored);

        assert_eq!(first.await.unwrap().unwrap(), VerifyOutcome::Verified);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.navigator.count(Route::Dashboard), 1);
    }

    #[tokio::test]
    async fn abandoned_verify_leaves_flow_usable() {
        let h = harness(ScriptedGateway {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), h.flow.verify(CORRECT_OTP)).await;
        assert!(timed_out.is_err());
        assert_eq!(h.flow.state(), OtpState::Issued);

        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.navigator.count(Route::Dashboard), 1);
    }

    #[tokio::test]
    async fn abandoned_resend_leaves_flow_usable() {
        let h = harness(ScriptedGateway {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        h.clock.advance(chrono::Duration::seconds(31));

        let timed_out = tokio::time::timeout(Duration::from_millis(20), h.flow.resend()).await;
        assert!(timed_out.is_err());

        assert_eq!(h.flow.resend().await.unwrap(), ResendOutcome::Sent);
        assert_eq!(h.gateway.send_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_clears_token_and_goes_back() {
        let h = harness(ScriptedGateway::default());
        h.flow.close().unwrap();

        assert_eq!(h.flow.state(), OtpState::Abandoned);
        assert!(h.session.access_token().is_none());
        assert_eq!(h.navigator.routes(), vec![Route::Back]);
        assert_eq!(h.flow.verify(CORRECT_OTP).await.unwrap(), VerifyOutcome::Ignored);
        assert_eq!(h.navigator.count(Route::Dashboard), 0);
    }

    #[tokio::test]
    async fn change_number_clears_token_and_goes_to_login() {
        let h = harness(ScriptedGateway::default());
        h.flow.change_number().unwrap();

        assert!(h.session.access_token().is_none());
        assert_eq!(h.navigator.routes(), vec![Route::Login]);
    }

    #[tokio::test]
    async fn close_during_verify_discards_result() {
        let h = harness(ScriptedGateway {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });

        let pending = {
            let flow = h.flow.clone();
            tokio::spawn(async move { flow.verify(CORRECT_OTP).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.flow.close().unwrap();

        assert_eq!(pending.await.unwrap().unwrap_err(), ClientError::Cancelled);
        assert_eq!(h.flow.state(), OtpState::Abandoned);
        assert!(!h.session.is_authenticated());
        assert_eq!(h.navigator.routes(), vec![Route::Back]);
    }

    #[tokio::test]
    async fn close_after_verified_is_a_no_op() {
        let h = harness(ScriptedGateway::default());
        h.flow.verify(CORRECT_OTP).await.unwrap();
        h.flow.close().unwrap();

        assert_eq!(h.flow.state(), OtpState::Verified);
        assert!(h.session.is_authenticated());
        assert_eq!(h.navigator.routes(), vec![Route::Dashboard]);
    }

    #[tokio::test]
    async fn resend_respects_cooldown() {
        let h = harness(ScriptedGateway::default());

        h.clock.advance(chrono::Duration::seconds(10));
        assert_eq!(
            h.flow.resend().await.unwrap_err(),
            ClientError::CooldownActive { remaining_secs: 20 }
        );
        assert_eq!(h.gateway.send_calls.load(Ordering::SeqCst), 0);

        h.clock.advance(chrono::Duration::seconds(20));
        assert_eq!(h.flow.resend().await.unwrap(), ResendOutcome::Sent);
        assert_eq!(h.flow.cooldown_remaining(), 30);
        assert!(matches!(
            h.flow.resend().await,
            Err(ClientError::CooldownActive { .. })
        ));
    }

    #[tokio::test]
    async fn resend_cooldown_carries_over_a_reloaded_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let opened = Utc::now();
        let clock = ManualClock::new(opened);
        let gateway = Arc::new(ScriptedGateway::default());

        let flow_for = |session: SessionManager| {
            let issued_at = session.current().unwrap().unwrap().otp_issued_at();
            OtpFlow::new(
                gateway.clone(),
                session,
                Arc::new(RecordingNavigator::new()),
                Arc::new(clock.clone()),
                OtpChallenge::login("9876543210", issued_at),
                Duration::from_secs(30),
            )
        };

        let first = SessionManager::new(FileSessionStore::new(&path));
        first.begin_login(test_grant("42"), opened).unwrap();
        clock.advance(chrono::Duration::seconds(31));
        assert_eq!(flow_for(first).resend().await.unwrap(), ResendOutcome::Sent);

        clock.advance(chrono::Duration::seconds(1));
        let reloaded = SessionManager::new(FileSessionStore::new(&path));
        assert_eq!(
            flow_for(reloaded).resend().await.unwrap_err(),
            ClientError::CooldownActive { remaining_secs: 29 }
        );
        assert_eq!(gateway.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resend_after_failure_returns_to_issued() {
        let h = harness(ScriptedGateway::default().verify_with(rejected("Invalid OTP")));
        h.flow.verify("111111").await.unwrap();
        h.clock.advance(chrono::Duration::seconds(31));

        assert_eq!(h.flow.resend().await.unwrap(), ResendOutcome::Sent);
        assert_eq!(h.flow.state(), OtpState::Issued);
    }

    #[tokio::test]
    async fn resend_maps_account_messages() {
        let h = harness(
            ScriptedGateway::default()
                .send_with(rejected("User not exists"))
                .send_with(Err(ClientError::request_failed(409, "User already exists"))),
        );
        h.clock.advance(chrono::Duration::seconds(31));

        assert_eq!(
            h.flow.resend().await.unwrap_err().user_message(),
            USER_NOT_FOUND_MESSAGE
        );
        assert_eq!(
            h.flow.resend().await.unwrap_err().user_message(),
            USER_ALREADY_REGISTERED_MESSAGE
        );
    }
}
