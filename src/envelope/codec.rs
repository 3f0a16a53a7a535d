// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope codec: seals JSON payloads for the backend and opens its replies.
//!
//! ## Wire Format
//!
//! ```text
//! base64( nonce[12] || AES-256-GCM ciphertext || tag[16] )
//! ```
//!
//! Standard alphabet with padding. The plaintext is always the JSON
//! serialisation of the payload, so `decode(encode(x)) == x` for every
//! JSON-serialisable `x`.
//!
//! ## Tolerance
//!
//! Backend replies are inconsistent: some are ciphertext strings, some are
//! plain JSON objects, and some are ciphertext of a JSON *string* holding the
//! object. [`EnvelopeCodec::decode`] passes already-decoded values through
//! untouched, [`EnvelopeCodec::decode_lenient`] falls back to plain JSON when a
//! string is not ciphertext, and [`EnvelopeCodec::open_response`] is the one
//! place that turns any of those shapes into an [`ApiResponse`].

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64ct::{Base64, Encoding};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::response::ApiResponse;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Errors raised while opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("envelope is not valid base64")]
    InvalidBase64,

    #[error("envelope is too short to hold a nonce")]
    TooShort,

    #[error("envelope failed authentication")]
    Authentication,

    #[error("envelope plaintext is not UTF-8")]
    InvalidUtf8,

    #[error("envelope plaintext is not JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("response shape mismatch: {0}")]
    Shape(String),
}

/// Errors raised while sealing a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("payload is not JSON-serialisable: {0}")]
    Serialize(String),

    #[error("encryption failed")]
    Encrypt,
}

/// Error building a codec from key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("envelope key must be 32 bytes")]
pub struct InvalidKey;

/// Symmetric codec shared by every JSON request and response in a session.
#[derive(Clone)]
pub struct EnvelopeCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("cipher", &"<redacted>")
            .finish()
    }
}

impl EnvelopeCodec {
    /// Build from raw key bytes (must be exactly 32).
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, InvalidKey> {
        if key.len() != KEY_LEN {
            return Err(InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(key: &str) -> Result<Self, InvalidKey> {
        let bytes = Base64::decode_vec(key.trim()).map_err(|_| InvalidKey)?;
        Self::from_key_bytes(&bytes)
    }

    /// Build from a passphrase; the key is its SHA-256 digest.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(digest.as_slice())),
        }
    }

    /// Accept either a base64 32-byte key or a passphrase.
    pub fn from_secret(secret: &str) -> Self {
        Self::from_base64_key(secret).unwrap_or_else(|_| Self::from_passphrase(secret))
    }

    /// Seal `payload` as JSON.
    pub fn encode<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, EncodeError> {
        let plaintext =
            serde_json::to_vec(payload).map_err(|e| EncodeError::Serialize(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| EncodeError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&combined))
    }

    /// Open a single ciphertext string into the JSON value it carried.
    pub fn open_str(&self, ciphertext: &str) -> Result<Value, DecodeError> {
        let combined =
            Base64::decode_vec(ciphertext.trim()).map_err(|_| DecodeError::InvalidBase64)?;
        if combined.len() < NONCE_LEN {
            return Err(DecodeError::TooShort);
        }
        let (nonce, sealed) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| DecodeError::Authentication)?;
        let text = String::from_utf8(plaintext).map_err(|_| DecodeError::InvalidUtf8)?;
        serde_json::from_str(&text).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }

    /// Decode a payload. Strings are treated as ciphertext; anything else is
    /// assumed to be decoded already and is returned unchanged.
    pub fn decode(&self, payload: &Value) -> Result<Value, DecodeError> {
        match payload {
            Value::String(ciphertext) => self.open_str(ciphertext),
            other => Ok(other.clone()),
        }
    }

    /// Like [`decode`](Self::decode), but a string that fails to open is
    /// parsed as plain JSON before giving up.
    pub fn decode_lenient(&self, payload: &Value) -> Result<Value, DecodeError> {
        let Value::String(text) = payload else {
            return Ok(payload.clone());
        };

        match self.open_str(text) {
            Ok(value) => Ok(value),
            Err(open_err) => match serde_json::from_str::<Value>(text) {
                Ok(value) => {
                    warn!(error = %open_err, "Envelope did not open; using plain JSON body");
                    Ok(value)
                }
                Err(_) => Err(open_err),
            },
        }
    }

    /// Turn any backend reply shape into an [`ApiResponse`].
    pub fn open_response(&self, payload: &Value) -> Result<ApiResponse, DecodeError> {
        let mut value = self.decode_lenient(payload)?;

        // Plaintext that was itself a JSON document serialised into a string.
        if let Value::String(inner) = &value {
            value = serde_json::from_str(inner)
                .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        }

        if !value.is_object() {
            return Err(DecodeError::NotAnObject(json_kind(&value)));
        }
        serde_json::from_value(value).map_err(|e| DecodeError::Shape(e.to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
