//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AgentScopeError, Result};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Gemini-style headers (x-goog-api-key).
pub fn goog_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-goog-api-key", val);
    }
    headers
}

/// Content-Type only, for unauthenticated local servers.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> AgentScopeError {
    match status {
        401 | 403 => AgentScopeError::Authentication(body.to_string()),
        429 => AgentScopeError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => AgentScopeError::api(status, body),
    }
}

/// Send a prepared request and turn non-2xx responses into errors.
pub async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status.as_u16(), &body_text));
    }
    Ok(resp)
}

/// Split a response body into trimmed, non-empty lines.
///
/// Comment lines (starting with ':') are dropped. A trailing line without
/// a newline is still emitted when the body ends.
pub fn line_stream(resp: reqwest::Response) -> BoxStream<'static, Result<String>> {
    split_lines(resp.bytes_stream())
}

/// Line splitting over raw chunks. Bytes are buffered until a full line is
/// available, so a character split across chunks decodes intact.
pub(crate) fn split_lines<S, B, E>(chunks: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AgentScopeError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(chunks);

        while let Some(chunk_result) = chunks.next().await {
            match chunk_result {
                Ok(chunk) => buffer.extend_from_slice(chunk.as_ref()),
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                match decode_line(&raw[..line_end]) {
                    Ok(Some(line)) => yield Ok(line),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decode_line(&buffer) {
            Ok(Some(line)) => yield Ok(line),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    };

    Box::pin(stream)
}

fn decode_line(raw: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| AgentScopeError::Stream(format!("invalid UTF-8 in response line: {e}")))?;
    let line = text.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
