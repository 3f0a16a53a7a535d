// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Client
//!
//! One entry point, [`ApiClient::request`], for every backend call.
//!
//! ## Request Handling
//!
//! | Body | On the wire |
//! |------|-------------|
//! | [`RequestBody::Json`] | `{"encReq": "<ciphertext>"}` |
//! | [`RequestBody::Multipart`] | fields and files as-is, never sealed |
//! | [`RequestBody::Empty`] | no body |
//!
//! ## Error Classification
//!
//! | Outcome | Error |
//! |---------|-------|
//! | HTTP 401 or envelope `status: 401` on a bearer request | session invalidated, [`ClientError::AuthExpired`] |
//! | other HTTP 4xx/5xx | [`ClientError::RequestFailed`] with the server message |
//! | no response | [`ClientError::NetworkUnavailable`] |
//! | cancellation token fired | [`ClientError::Cancelled`] |
//!
//! Nothing is retried here. Envelope statuses other than 401 are returned to
//! the caller, which decides whether they mean "empty" or "failed".

use std::path::Path;
use std::time::Instant;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::envelope::{ApiResponse, EnvelopeCodec, ENVELOPE_FIELD};
use crate::error::ClientError;
use crate::session::SessionManager;

/// Correlation header sent with every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Request Types
// =============================================================================

/// Whether to attach the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Bearer,
    /// Login, sign-up, OTP and pincode routes.
    Anonymous,
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub auth: AuthMode,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn bearer() -> Self {
        Self::default()
    }

    pub fn anonymous() -> Self {
        Self {
            auth: AuthMode::Anonymous,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A file attached to a multipart request.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FilePart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).to_string();
        Self {
            field: field.into(),
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk, naming it after its last path component.
    pub async fn from_path(field: impl Into<String>, path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::validation("proof", format!("Could not read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(field, file_name, bytes))
    }
}

/// Unsealed multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| {
                    ClientError::Configuration(format!("invalid upload content type: {e}"))
                })?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sealed into the envelope before sending.
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn json<T: Serialize>(payload: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(payload).map_err(|e| {
            ClientError::Configuration(format!("request body is not JSON-serialisable: {e}"))
        })?;
        Ok(RequestBody::Json(value))
    }

    fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Json(_) => "envelope",
            RequestBody::Multipart(_) => "multipart",
        }
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    codec: EnvelopeCodec,
    session: SessionManager,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        codec: EnvelopeCodec,
        session: SessionManager,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            codec,
            session,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// Send one request and return the opened response envelope.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse, ClientError> {
        let cancel = options.cancel.clone().unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path, "Request abandoned by caller");
                Err(ClientError::Cancelled)
            }
            result = self.execute(method, path, body, options.auth) => result,
        }
    }

    /// `POST` a sealed JSON body.
    pub async fn post_json<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        options: RequestOptions,
    ) -> Result<ApiResponse, ClientError> {
        self.request(Method::POST, path, RequestBody::json(payload)?, options)
            .await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth: AuthMode,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.endpoint(path)?;
        let request_id = Uuid::new_v4().to_string();
        let body_kind = body.kind();
        let started = Instant::now();

        let mut builder = self
            .http
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id.as_str());

        if auth == AuthMode::Bearer {
            if let Some(token) = self.session.access_token() {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    ClientError::Session("stored access token is not a valid header".into())
                })?;
                builder = builder.header(AUTHORIZATION, value);
            }
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                let sealed = self.codec.encode(&value)?;
                builder.json(&json!({ ENVELOPE_FIELD: sealed }))
            }
            RequestBody::Multipart(form) => builder.multipart(form.into_form()?),
        };

        debug!(%request_id, %method, path, body = body_kind, "API request");

        let response = builder.send().await.map_err(|e| {
            warn!(%request_id, path, error = %e, "API request did not complete");
            ClientError::NetworkUnavailable(e.to_string())
        })?;

        let status = response.status();
        debug!(
            %request_id,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API response"
        );

        // On anonymous routes a 401 is a credential rejection, not an
        // expired session, and falls through to RequestFailed.
        if status == StatusCode::UNAUTHORIZED && auth == AuthMode::Bearer {
            self.expire_session(&request_id, path);
            return Err(ClientError::AuthExpired);
        }

        let payload = read_payload(response).await?;

        if !status.is_success() {
            let message = self
                .codec
                .open_response(&payload)
                .ok()
                .and_then(|r| r.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed on server side")
                        .to_string()
                });
            return Err(ClientError::request_failed(status.as_u16(), message));
        }

        let opened = self.codec.open_response(&payload)?;
        if opened.is_unauthorized() && auth == AuthMode::Bearer {
            self.expire_session(&request_id, path);
            return Err(ClientError::AuthExpired);
        }
        Ok(opened)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Configuration(format!("invalid API path {path}: {e}")))
    }

    fn expire_session(&self, request_id: &str, path: &str) {
        warn!(%request_id, path, "Backend rejected the session token");
        if let Err(e) = self.session.invalidate() {
            warn!(error = %e, "Failed to clear rejected session");
        }
    }
}

/// Response body as JSON, or as a bare string when it is raw ciphertext.
async fn read_payload(response: Response) -> Result<Value, ClientError> {
    let text = response
        .text()
        .await
        .map_err(|e| ClientError::NetworkUnavailable(format!("response body lost: {e}")))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
}

/// MIME type for an upload, by extension.
pub fn guess_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
