//! Shared HTTP client and failure classification.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};

use crate::catalog::Provider;
use crate::error::{CoreError, NetworkError};

/// Bounded timeout for every provider round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_ERROR_MESSAGE_LEN: usize = 200;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Standalone client with a custom deadline, bypassing the shared pool.
/// Tests use this to hit the timeout path without waiting out
/// [`REQUEST_TIMEOUT`].
pub fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to build HTTP client")
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(mut val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(mut val) = HeaderValue::from_str(api_key) {
        val.set_sensitive(true);
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Build Google-style headers. The key travels in a header, never the URL,
/// so transport errors cannot echo it.
pub fn google_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(mut val) = HeaderValue::from_str(api_key) {
        val.set_sensitive(true);
        headers.insert("x-goog-api-key", val);
    }
    headers
}

/// Classify a non-200 response into the shared taxonomy, consuming the body.
pub async fn classify_failure(provider: Provider, resp: reqwest::Response) -> CoreError {
    let status = resp.status().as_u16();
    let header_retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    status_to_error(provider, status, header_retry_after, &body)
}

/// Map an HTTP status plus error body into the shared taxonomy.
pub fn status_to_error(
    provider: Provider,
    status: u16,
    header_retry_after: Option<Duration>,
    body: &str,
) -> CoreError {
    match status {
        401 | 403 => NetworkError::Unauthorized(provider).into(),
        429 => NetworkError::RateLimited {
            retry_after: header_retry_after.or_else(|| retry_after_from_body(body)),
        }
        .into(),
        500..=599 => NetworkError::ServerError {
            status,
            message: error_message(body),
        }
        .into(),
        _ => NetworkError::InvalidResponse(format!(
            "unexpected status {status}: {}",
            error_message(body)
        ))
        .into(),
    }
}

/// Classify a transport-level failure. Timeouts get their own reason so the
/// UI can tell them apart from malformed payloads.
pub fn request_error(err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        NetworkError::InvalidResponse("timeout".to_string()).into()
    } else {
        NetworkError::InvalidResponse(format!("request failed: {err}")).into()
    }
}

/// Pull the human-readable message out of a provider error body. All three
/// providers nest it under `error.message`; fall back to the raw (truncated)
/// body when the shape differs.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    truncate(&message, MAX_ERROR_MESSAGE_LEN)
}

fn retry_after_from_body(body: &str) -> Option<Duration> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| Duration::from_millis((s * 1000.0) as u64))
        })
}

fn truncate(message: &str, max: usize) -> String {
    if message.chars().count() <= max {
        message.to_string()
    } else {
        let cut: String = message.chars().take(max).collect();
        format!("{cut}…")
    }
}
