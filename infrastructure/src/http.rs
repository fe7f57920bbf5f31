use domain::RagError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceKind {
    Embedding,
    Generation,
}

pub(crate) fn build_client(timeout: Duration, bearer: Option<&str>) -> Result<Client, RagError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = bearer {
        let auth = format!("Bearer {}", key.trim());
        let value = HeaderValue::from_str(&auth)
            .map_err(|_| RagError::MissingCredential("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| RagError::InvalidConfiguration(format!("failed to build HTTP client: {err}")))
}

/// Maps a failed send/receive to an error kind. Timeouts always stay distinguishable.
pub(crate) fn transport_error(kind: ServiceKind, url: &str, err: reqwest::Error) -> RagError {
    if err.is_timeout() {
        return RagError::ServiceTimeout(format!("{url}: {err}"));
    }
    match kind {
        ServiceKind::Embedding => RagError::EmbeddingService(format!("{url}: {err}")),
        ServiceKind::Generation if err.is_connect() || err.is_request() => {
            RagError::ServiceUnavailable(format!("{url}: {err}"))
        }
        ServiceKind::Generation => RagError::Service(format!("{url}: {err}")),
    }
}

pub(crate) fn status_error(kind: ServiceKind, status: StatusCode, body: &str) -> RagError {
    let detail = format!("{status}: {}", body.trim());
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return RagError::ServiceTimeout(detail);
    }
    match kind {
        ServiceKind::Embedding => RagError::EmbeddingService(detail),
        ServiceKind::Generation => {
            let lowered = body.to_ascii_lowercase();
            if status == StatusCode::PAYLOAD_TOO_LARGE
                || lowered.contains("context_length_exceeded")
                || lowered.contains("maximum context length")
            {
                RagError::ContextTooLarge(detail)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                RagError::ServiceUnavailable(detail)
            } else {
                RagError::Service(detail)
            }
        }
    }
}

/// Reads the body of a response, turning non-2xx statuses into errors.
pub(crate) async fn read_success(
    kind: ServiceKind,
    url: &str,
    response: reqwest::Response,
) -> Result<String, RagError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| transport_error(kind, url, err))?;
    if !status.is_success() {
        return Err(status_error(kind, status, &text));
    }
    Ok(text)
}
