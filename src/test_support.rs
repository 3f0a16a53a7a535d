// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process fake backend for HTTP tests.
//!
//! Every request is recorded (sealed JSON bodies are opened with the shared
//! test codec, multipart fields and files are captured) and answered with the
//! reply scripted for its path. Unscripted paths get a plain 404.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use url::Url;

use crate::api::ApiClient;
use crate::config::{parse_base_url, ClientConfig};
use crate::envelope::{EnvelopeCodec, ENVELOPE_FIELD};
use crate::session::SessionManager;

pub(crate) const TEST_SECRET: &str = "mirror-hub-test-secret";

pub(crate) fn test_codec() -> EnvelopeCodec {
    EnvelopeCodec::from_passphrase(TEST_SECRET)
}

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// 200 with a raw ciphertext body.
    Sealed(Value),
    /// JSON body with the given HTTP status, unsealed.
    Plain(u16, Value),
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn sealed(value: Value) -> Self {
        Reply::Sealed(value)
    }

    pub fn plain(value: Value) -> Self {
        Reply::Plain(200, value)
    }

    pub fn status(status: u16, value: Value) -> Self {
        Reply::Plain(status, value)
    }

    pub fn delayed(self, by: Duration) -> Self {
        Reply::Delayed(by, Box::new(self))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedFile {
    pub field: String,
    pub file_name: String,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    /// Whether the body arrived as `{"encReq": ...}`.
    pub enveloped: bool,
    /// Opened envelope, or the raw JSON body.
    pub body: Value,
    pub fields: BTreeMap<String, String>,
    pub files: Vec<RecordedFile>,
}

struct BackendState {
    codec: EnvelopeCodec,
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub(crate) struct FakeBackend {
    pub url: Url,
    state: Arc<BackendState>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            codec: test_codec(),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: parse_base_url(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    /// Script the reply for `path`, replacing any earlier one.
    pub fn on(&self, path: &str, reply: Reply) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.requests().into_iter().rev().find(|r| r.path == path)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url.clone(), TEST_SECRET)
    }

    pub fn client(&self, session: SessionManager) -> ApiClient {
        let config = self.config();
        ApiClient::new(&config, config.codec(), session).unwrap()
    }
}

async fn handle(State(state): State<Arc<BackendState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    let authorization = header_str(&headers, header::AUTHORIZATION.as_str());
    let request_id = header_str(&headers, "x-request-id");
    let is_multipart = header_str(&headers, header::CONTENT_TYPE.as_str())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let mut recorded = RecordedRequest {
        path: path.clone(),
        authorization,
        request_id,
        enveloped: false,
        body: Value::Null,
        fields: BTreeMap::new(),
        files: Vec::new(),
    };

    if is_multipart {
        if let Ok(mut multipart) = Multipart::from_request(request, &()).await {
            while let Ok(Some(field)) = multipart.next_field().await {
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.unwrap_or_default();
                match file_name {
                    Some(file_name) => recorded.files.push(RecordedFile {
                        field: name,
                        file_name,
                        len: bytes.len(),
                    }),
                    None => {
                        recorded
                            .fields
                            .insert(name, String::from_utf8_lossy(&bytes).into_owned());
                    }
                }
            }
        }
    } else if let Ok(bytes) = Bytes::from_request(request, &()).await {
        let raw: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        match raw.get(ENVELOPE_FIELD).and_then(Value::as_str) {
            Some(sealed) => {
                recorded.enveloped = true;
                recorded.body = state.codec.open_str(sealed).unwrap_or(Value::Null);
            }
            None => recorded.body = raw,
        }
    }

    state.requests.lock().unwrap().push(recorded);

    let reply = state.routes.lock().unwrap().get(&path).cloned();
    match reply {
        Some(reply) => render(&state.codec, reply).await,
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn render(codec: &EnvelopeCodec, mut reply: Reply) -> Response {
    loop {
        match reply {
            Reply::Delayed(by, inner) => {
                tokio::time::sleep(by).await;
                reply = *inner;
            }
            Reply::Sealed(value) => {
                let sealed = codec.encode(&value).unwrap();
                return (StatusCode::OK, sealed).into_response();
            }
            Reply::Plain(status, value) => {
                let status = StatusCode::from_u16(status).unwrap();
                return (status, Json(value)).into_response();
            }
        }
    }
}
