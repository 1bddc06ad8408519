use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use reqwest::{
    Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue},
};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::{config::AppConfig, error::ClientError};

/// Header used to correlate a client request with backend log lines.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ApiRequest
///
/// A single JSON call against the backend, described independently of the
/// HTTP client that will carry it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the backend host, always starting with `/`.
    pub path: String,
    /// Bearer token for the `Authorization` header, when the call is authenticated.
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// 1. HttpTransport Contract
/// HttpTransport
///
/// Abstract contract for talking to the backend. The service layer only sees
/// decoded JSON, so the reqwest client can be swapped for the scripted
/// `MockTransport` in tests.
///
/// Implementations return `ClientError::Transport` for network and parse
/// failures and `ClientError::Rejected` when the payload follows the server
/// error convention (see `interpret_body`).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError>;
}

/// TransportState
///
/// The shared handle type for a transport.
pub type TransportState = Arc<dyn HttpTransport>;

/// interpret_body
///
/// Applies the backend's error convention to a raw response body: any JSON
/// object containing an `error` key is a failure regardless of HTTP status,
/// and its `message` becomes the error text. An empty body reads as `null`.
pub fn interpret_body(raw: &[u8]) -> Result<Value, ClientError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_slice(raw)?;
    check_rejection(value)
}

fn check_rejection(value: Value) -> Result<Value, ClientError> {
    match value.as_object() {
        Some(object) if object.contains_key("error") => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request rejected");
            Err(ClientError::Rejected(message.to_string()))
        }
        _ => Ok(value),
    }
}

// 2. The Real Implementation (reqwest)
/// ReqwestTransport
///
/// Sends every request to `backend_host` with JSON `Accept`/`Content-Type`
/// headers, an optional bearer token and a fresh `x-request-id`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    backend_host: String,
}

impl ReqwestTransport {
    /// new
    ///
    /// Builds the HTTP client from the loaded configuration.
    ///
    /// # Errors
    /// Returns `ClientError::Transport` if the underlying client cannot be built
    /// (e.g. TLS backend initialization failure).
    pub fn new(config: &AppConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            backend_host: config.backend_host.trim_end_matches('/').to_string(),
        })
    }

    async fn dispatch(&self, request: ApiRequest, request_id: &str) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.backend_host, request.path);
        let mut builder = self
            .client
            .request(request.method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(REQUEST_ID_HEADER, request_id);

        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();
        let raw = response.bytes().await?;
        tracing::debug!(status = status.as_u16(), bytes = raw.len(), "response received");

        interpret_body(&raw)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::debug_span!(
            "backend_request",
            method = %request.method,
            path = %request.path,
            req_id = %request_id,
        );

        self.dispatch(request, &request_id).instrument(span).await
    }
}

// 3. The Mock Implementation (For Tests)
/// MockTransport
///
/// Replays scripted responses in order and records every request it receives,
/// so tests can assert on paths, bodies and headers without a network.
/// Scripted `Ok` values still go through the error convention, so a scripted
/// `{"error": true, "message": "dup"}` behaves like a real rejection.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<Value, ClientError>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful JSON response.
    pub fn respond(&self, body: Value) -> &Self {
        self.push(Ok(body));
        self
    }

    /// Queue a transport-level failure (connection refused, bad JSON, ...).
    pub fn fail(&self, message: &str) -> &Self {
        self.push(Err(ClientError::Transport(message.to_string())));
        self
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn push(&self, response: Result<Value, ClientError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        match next {
            Some(Ok(value)) => check_rejection(value),
            Some(Err(err)) => Err(err),
            None => Err(ClientError::Transport(
                "mock transport: no scripted response".to_string(),
            )),
        }
    }
}
