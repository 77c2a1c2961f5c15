//! HTTP helpers shared by provider implementations.
//!
//! Every vendor call funnels its response through here so non-success
//! statuses become `TransportError` with the body attached, the same way for
//! every provider.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CoreError, CoreResult};

/// Longest response body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Builds the HTTP client used by all providers
pub fn build_client(timeout_secs: u64) -> CoreResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Detailed { message: Option<String> },
    Plain(String),
}

/// Maps a non-success response to `TransportError`.
///
/// Pulls `error.message` out of the usual vendor envelope when present,
/// otherwise keeps the (truncated) raw body.
pub fn api_error(provider: &str, status: StatusCode, body: &str) -> CoreError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .and_then(|err| match err {
            ApiErrorBody::Detailed { message } => message,
            ApiErrorBody::Plain(message) => Some(message),
        })
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect());

    CoreError::transport(provider, status.as_u16(), message)
}

/// Sends a request and returns the body text of a 2xx response
pub async fn send_for_text(provider: &str, request: reqwest::RequestBuilder) -> CoreResult<String> {
    let response = request
        .send()
        .await
        .map_err(|e| CoreError::network(provider, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CoreError::network(provider, format!("Failed to read response: {}", e)))?;

    if !status.is_success() {
        return Err(api_error(provider, status, &body));
    }
    Ok(body)
}

/// Sends a request and decodes a 2xx JSON body
pub async fn send_for_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> CoreResult<T> {
    let body = send_for_text(provider, request).await?;
    serde_json::from_str(&body).map_err(|e| CoreError::parse(provider, e))
}

/// Sends a request and returns the raw bytes and content type of a 2xx body
pub async fn send_for_bytes(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> CoreResult<(Vec<u8>, Option<String>)> {
    send_for_bytes_limited(provider, request, u64::MAX).await
}

/// Like `send_for_bytes`, but stops reading once the body passes `max_bytes`.
///
/// A declared `Content-Length` over the limit is rejected before any of the
/// body is read.
pub async fn send_for_bytes_limited(
    provider: &str,
    request: reqwest::RequestBuilder,
    max_bytes: u64,
) -> CoreResult<(Vec<u8>, Option<String>)> {
    let mut response = request
        .send()
        .await
        .map_err(|e| CoreError::network(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(provider, status, &body));
    }

    let too_large =
        || CoreError::ValidationError(format!("Download exceeds {} bytes", max_bytes));
    if response.content_length().is_some_and(|len| len > max_bytes) {
        return Err(too_large());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty());

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| CoreError::network(provider, format!("Failed to read body: {}", e)))?
    {
        if (bytes.len() + chunk.len()) as u64 > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok((bytes, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_extracts_message() {
        let err = api_error(
            "openai",
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Invalid key","type":"auth"}}"#,
        );
        assert_eq!(err.to_string(), "openai transport error (401): Invalid key");
    }

    #[test]
    fn test_api_error_plain_string_error() {
        let err = api_error("runway", StatusCode::BAD_REQUEST, r#"{"error":"bad image"}"#);
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().ends_with("bad image"));
    }

    #[test]
    fn test_api_error_truncates_raw_body() {
        let body = "x".repeat(2000);
        match api_error("hedra", StatusCode::BAD_GATEWAY, &body) {
            CoreError::TransportError { body, status, .. } => {
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS);
                assert_eq!(status, Some(502));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_for_bytes_reports_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file.png")
            .with_status(200)
            .with_header("content-type", "image/png; charset=binary")
            .with_body(vec![1u8, 2, 3])
            .create_async()
            .await;

        let client = build_client(10).unwrap();
        let (bytes, mime) = send_for_bytes("fetch", client.get(format!("{}/file.png", server.url())))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_send_for_bytes_limited_rejects_oversized_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.bin")
            .with_status(200)
            .with_body(vec![7u8; 10])
            .create_async()
            .await;

        let client = build_client(10).unwrap();
        let url = format!("{}/big.bin", server.url());

        let err = send_for_bytes_limited("fetch", client.get(&url), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(msg) if msg.contains("4 bytes")));

        let (bytes, _) = send_for_bytes_limited("fetch", client.get(&url), 10)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 10);
    }
}
