// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mirror Hub Client - client core for the Mirror Hub wallet portal
//!
//! Talks to the Mirror Hub backend through its encrypted request envelope,
//! keeps the login session, and drives the multi-step flows of the portal
//! (OTP verification, add money) without any UI.
//!
//! ## Modules
//!
//! - `envelope` - AES-GCM request/response envelope and response contract
//! - `api` - HTTP client and typed backend operations (reqwest)
//! - `session` - login session, stores, single-writer manager
//! - `otp` - OTP verification flow with resend cooldown
//! - `workflow` - generic step wizard and the add-money workflow
//! - `navigation` - route port and the authenticated-area guard
//! - `config` / `logging` - environment configuration and tracing setup

pub mod api;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod otp;
pub mod serde_util;
pub mod session;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ValidationErrors};
pub use session::{Session, SessionManager};
