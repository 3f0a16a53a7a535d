// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted API Envelope
//!
//! JSON requests travel as `{ "encReq": "<ciphertext>" }`; replies arrive as a
//! ciphertext string (or, inconsistently, a plain JSON object) that opens to
//! `{ status, message?, data? }`. Multipart uploads never pass through here.

pub mod codec;
pub mod response;

pub use codec::{DecodeError, EncodeError, EnvelopeCodec, InvalidKey};
pub use response::{ApiResponse, DATA_NOT_FOUND, STATUS_UNAUTHORIZED};

/// Field name carrying the sealed request body.
pub const ENVELOPE_FIELD: &str = "encReq";
