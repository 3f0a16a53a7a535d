// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session
//!
//! The authenticated identity of the portal user. Components read the session
//! freely; only [`SessionManager`] writes it, one transition at a time.
//!
//! ## Lifecycle
//!
//! | Transition | Writer | Result |
//! |------------|--------|--------|
//! | password login accepted | [`SessionManager::begin_login`] | pending session, OTP not verified |
//! | OTP resent | [`SessionManager::record_otp_sent`] | resend cooldown restarts |
//! | OTP verified | [`SessionManager::complete_otp`] | authenticated session |
//! | profile loaded or edited | [`SessionManager::update_profile`] | profile snapshot merged |
//! | close / change number | [`SessionManager::abandon_challenge`] | cleared |
//! | token rejected (401) | [`SessionManager::invalidate`] | cleared |
//! | logout | [`SessionManager::logout`] | cleared |
//!
//! Storage is pluggable through [`SessionStore`]: [`InMemorySessionStore`]
//! for embedding and tests, [`FileSessionStore`] for the CLI.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ClientError;

pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;

// =============================================================================
// Role
// =============================================================================

/// Portal role stored alongside the user id.
///
/// Password login always grants `User`; anything else read back from storage
/// is treated as `Guest` and never passes the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Logged-in portal member.
    User,
    /// No portal access.
    #[default]
    #[serde(other)]
    Guest,
}

impl Role {
    pub fn has_portal_access(&self) -> bool {
        matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Guest => write!(f, "guest"),
        }
    }
}

// =============================================================================
// Session Data
// =============================================================================

/// Profile fields cached in the session for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Staff role name reported at login (`role_name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anniversary_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl ProfileSnapshot {
    /// "First Last", or whichever half is known.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Overwrite every field that `update` carries; keep the rest.
    pub fn merge(&mut self, update: ProfileSnapshot) {
        fn take(dst: &mut Option<String>, src: Option<String>) {
            if src.is_some() {
                *dst = src;
            }
        }

        take(&mut self.first_name, update.first_name);
        take(&mut self.last_name, update.last_name);
        take(&mut self.email, update.email);
        take(&mut self.employee_role, update.employee_role);
        take(&mut self.mlm_id, update.mlm_id);
        take(&mut self.rank, update.rank);
        take(&mut self.pincode, update.pincode);
        take(&mut self.state, update.state);
        take(&mut self.city, update.city);
        take(&mut self.district, update.district);
        take(&mut self.address, update.address);
        take(&mut self.dob, update.dob);
        take(&mut self.anniversary_date, update.anniversary_date);
        take(&mut self.gender, update.gender);
        take(&mut self.profile_image, update.profile_image);
    }
}

/// Authenticated identity held for the lifetime of a login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub role: Role,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub mobile: String,
    #[serde(default)]
    pub profile: ProfileSnapshot,
    pub created_at: DateTime<Utc>,
    /// Last OTP resend; the login itself sent the first one at `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_verified_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("mobile", &self.mobile)
            .field("profile", &self.profile)
            .field("created_at", &self.created_at)
            .field("otp_sent_at", &self.otp_sent_at)
            .field("otp_verified_at", &self.otp_verified_at)
            .finish()
    }
}

impl Session {
    /// The `withAuth` rule: a user id, the portal role, and a verified OTP.
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.trim().is_empty()
            && self.role.has_portal_access()
            && self.otp_verified_at.is_some()
    }

    pub fn is_pending_otp(&self) -> bool {
        self.otp_verified_at.is_none()
    }

    /// When the OTP currently in play was sent.
    pub fn otp_issued_at(&self) -> DateTime<Utc> {
        self.otp_sent_at.unwrap_or(self.created_at)
    }
}

/// What a successful password login hands to [`SessionManager::begin_login`].
#[derive(Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub mobile: String,
    pub profile: ProfileSnapshot,
}

impl fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginGrant")
            .field("user_id", &self.user_id)
            .field("mobile", &self.mobile)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Session storage errors.
#[derive(Debug)]
pub enum SessionError {
    /// I/O error reading or writing the backing store.
    Io(std::io::Error),
    /// Stored session could not be (de)serialised.
    Serialization(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "I/O error: {e}"),
            SessionError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            SessionError::Serialization(_) => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

/// Backing store for the single current session.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

// =============================================================================
// Session Manager
// =============================================================================

/// The only writer of the session.
///
/// Cloning shares the same store and the same writer lock, so transitions
/// started from different components never interleave.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    writer: Arc<Mutex<()>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Self::from_store(Arc::new(store))
    }

    pub fn from_store(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Session backed by an [`InMemorySessionStore`].
    pub fn in_memory() -> Self {
        Self::new(InMemorySessionStore::new())
    }

    // ========== Reads ==========

    pub fn current(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.store.load()?)
    }

    /// Current session, treating an unreadable store as "no session".
    pub fn snapshot(&self) -> Option<Session> {
        match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to read session; treating as logged out");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_some_and(|s| s.is_authenticated())
    }

    /// Bearer token for outgoing requests, if any.
    pub fn access_token(&self) -> Option<String> {
        self.snapshot()
            .map(|s| s.access_token)
            .filter(|t| !t.is_empty())
    }

    /// User id of the stored session, pending or verified.
    pub fn require_user_id(&self) -> Result<String, ClientError> {
        self.snapshot()
            .map(|s| s.user_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(ClientError::NotAuthenticated)
    }

    // ========== Writers ==========

    /// Password login accepted: open a session that still awaits OTP.
    pub fn begin_login(&self, grant: LoginGrant, at: DateTime<Utc>) -> Result<Session, ClientError> {
        let _guard = self.lock();
        let session = Session {
            user_id: grant.user_id,
            role: Role::User,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            mobile: grant.mobile,
            profile: grant.profile,
            created_at: at,
            otp_sent_at: None,
            otp_verified_at: None,
        };
        self.store.save(&session)?;
        info!(user_id = %session.user_id, "Session opened, awaiting OTP");
        Ok(session)
    }

    /// A fresh OTP went out; the resend cooldown now runs from `at`.
    pub fn record_otp_sent(&self, at: DateTime<Utc>) -> Result<Session, ClientError> {
        let _guard = self.lock();
        let mut session = self.store.load()?.ok_or(ClientError::NotAuthenticated)?;
        session.otp_sent_at = Some(at);
        self.store.save(&session)?;
        Ok(session)
    }

    /// OTP accepted: the pending session becomes authenticated.
    pub fn complete_otp(&self, at: DateTime<Utc>) -> Result<Session, ClientError> {
        let _guard = self.lock();
        let mut session = self.store.load()?.ok_or(ClientError::NotAuthenticated)?;
        session.otp_verified_at = Some(at);
        self.store.save(&session)?;
        info!(user_id = %session.user_id, "OTP verified, session authenticated");
        Ok(session)
    }

    /// Merge freshly loaded or edited profile fields into the session.
    pub fn update_profile(&self, update: ProfileSnapshot) -> Result<Session, ClientError> {
        let _guard = self.lock();
        let mut session = self.store.load()?.ok_or(ClientError::NotAuthenticated)?;
        session.profile.merge(update);
        self.store.save(&session)?;
        info!(user_id = %session.user_id, "Session profile updated");
        Ok(session)
    }

    /// OTP challenge closed or number changed: drop any partial session.
    pub fn abandon_challenge(&self) -> Result<(), ClientError> {
        self.clear_with_reason("otp_abandoned")
    }

    /// Backend rejected the token.
    pub fn invalidate(&self) -> Result<(), ClientError> {
        self.clear_with_reason("token_rejected")
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.clear_with_reason("logout")
    }

    fn clear_with_reason(&self, reason: &'static str) -> Result<(), ClientError> {
        let _guard = self.lock();
        self.store.clear()?;
        info!(reason, "Session cleared");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) fn test_grant(user_id: &str) -> LoginGrant {
    LoginGrant {
        user_id: user_id.to_string(),
        access_token: format!("token-{user_id}"),
        refresh_token: None,
        mobile: "9876543210".to_string(),
        profile: ProfileSnapshot {
            first_name: Some("Asha".into()),
            last_name: Some("Rao".into()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_opens_pending_session() {
        let manager = SessionManager::in_memory();
        let session = manager.begin_login(test_grant("42"), Utc::now()).unwrap();

        assert_eq!(session.role, Role::User);
        assert!(session.is_pending_otp());
        assert!(!manager.is_authenticated());
        assert_eq!(manager.access_token().as_deref(), Some("token-42"));
        assert_eq!(manager.require_user_id().unwrap(), "42");
    }

    #[test]
    fn otp_completes_authentication() {
        let manager = SessionManager::in_memory();
        manager.begin_login(test_grant("42"), Utc::now()).unwrap();
        manager.complete_otp(Utc::now()).unwrap();
        assert!(manager.is_authenticated());
    }

    #[test]
    fn complete_otp_without_session_fails() {
        let manager = SessionManager::in_memory();
        assert_eq!(
            manager.complete_otp(Utc::now()).unwrap_err(),
            ClientError::NotAuthenticated
        );
    }

    #[test]
    fn resend_time_moves_otp_issue_time() {
        let manager = SessionManager::in_memory();
        let opened = Utc::now();
        let session = manager.begin_login(test_grant("42"), opened).unwrap();
        assert_eq!(session.otp_issued_at(), opened);

        let resent = opened + chrono::Duration::seconds(45);
        let session = manager.record_otp_sent(resent).unwrap();
        assert_eq!(session.otp_issued_at(), resent);
        assert_eq!(session.created_at, opened);
    }

    #[test]
    fn profile_update_merges_fields() {
        let manager = SessionManager::in_memory();
        manager.begin_login(test_grant("42"), Utc::now()).unwrap();

        let session = manager
            .update_profile(ProfileSnapshot {
                pincode: Some("560001".into()),
                last_name: Some("Iyer".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(session.profile.first_name.as_deref(), Some("Asha"));
        assert_eq!(session.profile.last_name.as_deref(), Some("Iyer"));
        assert_eq!(session.profile.pincode.as_deref(), Some("560001"));
        assert_eq!(session.profile.display_name().as_deref(), Some("Asha Iyer"));
    }

    #[test]
    fn clearing_transitions_remove_token() {
        for clear in [
            SessionManager::abandon_challenge as fn(&SessionManager) -> Result<(), ClientError>,
            SessionManager::invalidate,
            SessionManager::logout,
        ] {
            let manager = SessionManager::in_memory();
            manager.begin_login(test_grant("7"), Utc::now()).unwrap();
            clear(&manager).unwrap();
            assert!(manager.access_token().is_none());
            assert_eq!(
                manager.require_user_id().unwrap_err(),
                ClientError::NotAuthenticated
            );
        }
    }

    #[test]
    fn guest_role_is_never_authenticated() {
        let manager = SessionManager::in_memory();
        let mut session = manager.begin_login(test_grant("42"), Utc::now()).unwrap();
        session.role = Role::Guest;
        session.otp_verified_at = Some(Utc::now());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn unknown_role_deserialises_as_guest() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Guest);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn debug_output_hides_tokens() {
        let manager = SessionManager::in_memory();
        let session = manager.begin_login(test_grant("42"), Utc::now()).unwrap();
        let printed = format!("{session:?}");
        assert!(!printed.contains("token-42"));
    }
}
