// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and [`ClientConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MIRRORHUB_API_BASE_URL` | Backend origin; route paths are joined onto it | `http://localhost:4223` |
//! | `MIRRORHUB_ENVELOPE_KEY` | Base64 32-byte key, or a passphrase hashed with SHA-256 | Required |
//! | `MIRRORHUB_HTTP_TIMEOUT_SECS` | Per-request timeout | `15` |
//! | `MIRRORHUB_OTP_COOLDOWN_SECS` | Minimum gap between OTP sends | `30` |
//! | `MIRRORHUB_SESSION_FILE` | Session file used by the CLI | `.mirrorhub/session.json` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::envelope::EnvelopeCodec;
use crate::error::ClientError;

pub const API_BASE_URL_ENV: &str = "MIRRORHUB_API_BASE_URL";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:4223";

/// Shared envelope secret. Never logged.
pub const ENVELOPE_KEY_ENV: &str = "MIRRORHUB_ENVELOPE_KEY";

pub const HTTP_TIMEOUT_SECS_ENV: &str = "MIRRORHUB_HTTP_TIMEOUT_SECS";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

pub const OTP_COOLDOWN_SECS_ENV: &str = "MIRRORHUB_OTP_COOLDOWN_SECS";
pub const DEFAULT_OTP_COOLDOWN_SECS: u64 = 30;

pub const SESSION_FILE_ENV: &str = "MIRRORHUB_SESSION_FILE";
pub const DEFAULT_SESSION_FILE: &str = ".mirrorhub/session.json";

/// Logging format selector (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl From<ConfigError> for ClientError {
    fn from(e: ConfigError) -> Self {
        ClientError::Configuration(e.to_string())
    }
}

/// Settings for one client instance.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub envelope_secret: String,
    pub http_timeout: Duration,
    pub otp_cooldown: Duration,
    pub session_file: PathBuf,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("envelope_secret", &"<redacted>")
            .field("http_timeout", &self.http_timeout)
            .field("otp_cooldown", &self.otp_cooldown)
            .field("session_file", &self.session_file)
            .finish()
    }
}

impl ClientConfig {
    /// Config with defaults for everything but the base URL and secret.
    pub fn new(base_url: Url, envelope_secret: impl Into<String>) -> Self {
        Self {
            base_url,
            envelope_secret: envelope_secret.into(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            otp_cooldown: Duration::from_secs(DEFAULT_OTP_COOLDOWN_SECS),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env_or_default(API_BASE_URL_ENV, DEFAULT_API_BASE_URL);
        let base_url = parse_base_url(&raw_url)?;
        let envelope_secret = env_required(ENVELOPE_KEY_ENV)?;
        let http_timeout = Duration::from_secs(env_secs(
            HTTP_TIMEOUT_SECS_ENV,
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let otp_cooldown = Duration::from_secs(env_secs(
            OTP_COOLDOWN_SECS_ENV,
            DEFAULT_OTP_COOLDOWN_SECS,
        )?);
        let session_file = PathBuf::from(env_or_default(SESSION_FILE_ENV, DEFAULT_SESSION_FILE));

        Ok(Self {
            base_url,
            envelope_secret,
            http_timeout,
            otp_cooldown,
            session_file,
        })
    }

    pub fn codec(&self) -> EnvelopeCodec {
        EnvelopeCodec::from_secret(&self.envelope_secret)
    }
}

/// Parse and normalise the backend origin so relative joins keep its path.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name: API_BASE_URL_ENV.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name: API_BASE_URL_ENV.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    env_optional(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_secs(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env_optional(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected whole seconds, got {raw:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("https://portal.example.com/backend").unwrap();
        assert_eq!(url.as_str(), "https://portal.example.com/backend/");
        assert_eq!(
            url.join("api/users/unblock").unwrap().as_str(),
            "https://portal.example.com/backend/api/users/unblock"
        );
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        assert!(matches!(
            parse_base_url("ftp://portal.example.com"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn new_uses_defaults() {
        let config = ClientConfig::new(parse_base_url(DEFAULT_API_BASE_URL).unwrap(), "secret");
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.otp_cooldown, Duration::from_secs(30));
        assert!(!format!("{config:?}").contains("secret\""));
    }

    #[test]
    fn config_error_maps_to_client_error() {
        let err: ClientError = ConfigError::Missing(ENVELOPE_KEY_ENV.into()).into();
        assert!(matches!(err, ClientError::Configuration(msg) if msg.contains(ENVELOPE_KEY_ENV)));
    }
}
