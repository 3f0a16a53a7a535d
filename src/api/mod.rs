// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Backend API client and typed operations.
//!
//! ## Routes
//!
//! | Module | Operations | Auth |
//! |--------|------------|------|
//! | `auth` | login, unblock, logout | anonymous |
//! | `otp` | send, verify | anonymous |
//! | `wallet` | add money, add-money history, wallet summary | bearer |
//! | `report` | income passbook | bearer |
//! | `profile` | profile, update | bearer |
//! | `profile` | pincode lookup | anonymous |
//! | `signup` | referral check, register | anonymous |

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod otp;
pub mod profile;
pub mod report;
pub mod signup;
pub mod wallet;

pub use auth::LoginForm;
pub use client::{
    guess_content_type, ApiClient, AuthMode, FilePart, MultipartForm, RequestBody,
    RequestOptions, REQUEST_ID_HEADER,
};
pub use profile::{ProfileOverview, ProfileUpdate};
pub use report::{IncomePassbook, PassbookPage, PassbookQuery, PAGE_SIZE};
pub use signup::{RegistrationForm, VerifiedReferral};
pub use wallet::AddMoneyRequest;
