// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoded backend reply: `{ status, message?, data?, ...extra }`.
//!
//! `status: 200` (or `success: true` on a few upload routes) means success.
//! Any other status, or the message `"Data Not Found"`, means the query
//! succeeded but had nothing to return.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Message the backend uses for an empty result set.
pub const DATA_NOT_FOUND: &str = "Data Not Found";

/// Envelope status that means the token is no longer accepted.
pub const STATUS_UNAUTHORIZED: u16 = 401;

const STATUS_OK: u16 = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde_util::opt_u16"
    )]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Top-level fields outside the common three (`token`, `totalAmount`,
    /// wallet balances, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == Some(STATUS_OK)
            || self.extra.get("success").and_then(Value::as_bool) == Some(true)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(STATUS_UNAUTHORIZED)
    }

    /// Successful query with nothing to show.
    pub fn is_empty_result(&self) -> bool {
        !self.is_success() || self.message.as_deref() == Some(DATA_NOT_FOUND)
    }

    /// Commands: anything but success becomes [`ClientError::RequestFailed`]
    /// carrying the server's message.
    ///
    /// An envelope 401 only reaches here from anonymous routes (the client
    /// turns it into [`ClientError::AuthExpired`] on bearer requests), so it
    /// is reported as a plain failure.
    pub fn ensure_success(self) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status.unwrap_or_default();
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Request failed on server side".to_string());
        Err(ClientError::request_failed(status, message))
    }

    /// Queries: the `data` array as typed rows, or an empty vec when the
    /// result is empty.
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, ClientError> {
        if self.is_empty_result() {
            return Ok(Vec::new());
        }
        match &self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(data) => serde_json::from_value(data.clone())
                .map_err(|e| ClientError::Decode(format!("unexpected data rows: {e}"))),
        }
    }

    /// `data` as a single typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| ClientError::Decode(format!("unexpected data payload: {e}")))
    }

    /// The whole top-level object as a typed value (for routes that put
    /// their payload beside `status` instead of under `data`).
    pub fn extra_as<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_value(Value::Object(self.extra.clone()))
            .map_err(|e| ClientError::Decode(format!("unexpected response fields: {e}")))
    }

    /// A top-level string field such as `token`.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
