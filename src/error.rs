// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Error Taxonomy
//!
//! Every fallible operation in this crate returns [`ClientError`]. Nothing is
//! fatal: each variant maps to a message that can be shown to the user via
//! [`ClientError::user_message`], and the form or wizard that produced it
//! stays where it was so the user can retry without re-entering data.
//!
//! | Variant | Origin | Recovery |
//! |---------|--------|----------|
//! | `Validation` | client-side field checks | inline field messages |
//! | `AuthExpired` | HTTP 401 or envelope `status: 401` | session cleared, re-login |
//! | `NotAuthenticated` | no user in the session | re-login |
//! | `Decode` | malformed envelope | alert |
//! | `RequestFailed` | 4xx/5xx or envelope rejection | server message shown verbatim |
//! | `NetworkUnavailable` | no response | generic retry prompt |
//! | `Cancelled` | caller abandoned the request | silent |
//! | `CooldownActive` | OTP resend too early | wait and retry |

use std::collections::BTreeMap;
use std::fmt;

use crate::envelope::{DecodeError, EncodeError};
use crate::session::SessionError;

/// Generic message shown when the backend cannot be reached.
pub const NETWORK_RETRY_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

/// Field-keyed validation messages, ordered by field name.
///
/// An empty set means the input is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding a single field error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record an error for `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Message for a single field, if it failed.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when empty, otherwise the set wrapped in [`ClientError::Validation`].
    pub fn into_result(self) -> Result<(), ClientError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.fields.values().map(String::as_str).collect();
        write!(f, "{}", messages.join(" "))
    }
}

/// Errors surfaced by the client core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("session expired")]
    AuthExpired,

    #[error("no authenticated user in session")]
    NotAuthenticated,

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("OTP resend available in {remaining_secs}s")]
    CooldownActive { remaining_secs: u64 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("session storage error: {0}")]
    Session(String),
}

impl ClientError {
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    /// Whether the caller should force a logout and send the user to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::AuthExpired | ClientError::NotAuthenticated)
    }

    /// Text for the dismissible alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors.to_string(),
            ClientError::AuthExpired => "Your session has expired. Please log in again.".into(),
            ClientError::NotAuthenticated => {
                "User not found in session. Please login again.".into()
            }
            ClientError::Decode(_) => {
                "Received an unreadable response from the server. Please try again.".into()
            }
            ClientError::RequestFailed { message, .. } => message.clone(),
            ClientError::NetworkUnavailable(_) => NETWORK_RETRY_MESSAGE.into(),
            ClientError::Cancelled => "Request cancelled.".into(),
            ClientError::CooldownActive { remaining_secs } => {
                format!("Please wait {remaining_secs} seconds before requesting a new OTP.")
            }
            ClientError::Configuration(msg) => format!("Client is misconfigured: {msg}"),
            ClientError::Session(_) => "Could not access the saved session.".into(),
        }
    }
}

impl From<DecodeError> for ClientError {
    fn from(e: DecodeError) -> Self {
        ClientError::Decode(e.to_string())
    }
}

impl From<EncodeError> for ClientError {
    fn from(e: EncodeError) -> Self {
        ClientError::Configuration(format!("could not seal request: {e}"))
    }
}

impl From<SessionError> for ClientError {
    fn from(e: SessionError) -> Self {
        ClientError::Session(e.to_string())
    }
}
