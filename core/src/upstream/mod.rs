//! Upstream HTTP client plus the narrow retry / degrade / error-extraction
//! policy. Kept behind a trait so the streaming bridge and the non-streaming
//! orchestrator can be exercised against a stub transport in tests.

pub mod sse;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

pub use sse::{decode_chat_stream, ChatStreamFrame};

/// HTTP statuses worth retrying: transient provider/network trouble.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Drains a streaming response's body into a single buffer, for the cases
/// where a streaming call actually returned a non-2xx error body (providers
/// return a plain JSON error document, not an event stream, on failure).
pub async fn buffer_streaming_response(
    mut resp: StreamingResponse,
) -> Result<BufferedResponse, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = resp.body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(BufferedResponse {
        status: resp.status,
        body: buf.freeze(),
    })
}

/// A fully buffered upstream HTTP response (used for the non-streaming path).
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: u16,
    pub body: Bytes,
}

impl BufferedResponse {
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_STATUSES.contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// An upstream HTTP response opened for streaming (used for the SSE path).
pub struct StreamingResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

/// Narrow interface to the upstream chat-completions endpoint.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn call(&self, payload: &Value) -> Result<BufferedResponse, TransportError>;
    async fn call_streaming(&self, payload: &Value) -> Result<StreamingResponse, TransportError>;
}

/// `reqwest`-backed implementation. One instance is shared process-wide; the
/// underlying client pools its own connections.
pub struct ReqwestUpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ReqwestUpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestUpstreamClient {
    async fn call(&self, payload: &Value) -> Result<BufferedResponse, TransportError> {
        let resp = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(BufferedResponse { status, body })
    }

    async fn call_streaming(&self, payload: &Value) -> Result<StreamingResponse, TransportError> {
        let resp = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .header("accept", "text/event-stream")
            .json(payload)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let stream = resp.bytes_stream();
        let body: ByteStream = Box::pin(futures::StreamExt::map(stream, |r| {
            r.map_err(TransportError::from)
        }));
        Ok(StreamingResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Exponential-jitter backoff retry policy. Mirrors `wait_exponential_jitter`:
/// each wait is `min(max_seconds, initial * 2^(attempt-1))` plus a uniform
/// jitter in `[0, initial)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.initial_backoff.as_secs_f64();
        let capped = self.max_backoff.as_secs_f64();
        let exp = initial * 2f64.powi(attempt.saturating_sub(1) as i32);
        let base = exp.min(capped);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..initial.max(0.001));
        Duration::from_secs_f64(base + jitter)
    }
}

/// Retries transport errors and retryable HTTP statuses up to `max_attempts`.
/// Does not perform field degradation; callers layer that on top of the final
/// `BufferedResponse` (see [`apply_degrade_fields`]).
pub async fn call_with_retry(
    transport: &dyn UpstreamTransport,
    payload: &Value,
    policy: &RetryPolicy,
) -> Result<BufferedResponse, TransportError> {
    let mut attempt = 1;
    loop {
        match transport.call(payload).await {
            Ok(resp) if resp.is_retryable() && attempt < policy.max_attempts => {
                tokio::time::sleep(policy.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Ok(resp) => return Ok(resp),
            Err(_e) if attempt < policy.max_attempts => {
                tokio::time::sleep(policy.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Extracts a human-readable error message from an upstream error body,
/// trying `{"error": {"message": ...}}`, then `{"message": ...}`, then the
/// raw body text.
pub fn extract_error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    String::from_utf8_lossy(body).to_string()
}

/// If `payload` contains any of `fields` (top-level keys) whose name appears
/// as a substring of `error_message`, removes the first such field and
/// returns `true`. Brittle by design (string matching); kept as specified.
pub fn apply_degrade_fields(payload: &mut Value, fields: &[String], error_message: &str) -> bool {
    let Some(obj) = payload.as_object_mut() else {
        return false;
    };
    for field in fields {
        if obj.contains_key(field) && error_message.contains(field.as_str()) {
            obj.remove(field);
            return true;
        }
    }
    false
}
