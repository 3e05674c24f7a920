//! HTTP plumbing shared by the hosted providers.
//!
//! Maps transport failures and non-success statuses onto [`ProviderError`]
//! so the agent's retry policy sees the same error kinds from every backend.

use crewforge_core::error::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Used when a 429 carries no usable `Retry-After` header.
pub(crate) const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build a client with a request timeout, falling back to reqwest's defaults
/// if the TLS backend refuses the custom builder.
pub(crate) fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a prepared request and decode a successful JSON body as `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &str,
    model: &str,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    })?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let retry_after = retry_after_secs(response.headers());
        let body = response.text().await.unwrap_or_default();
        let err = status_error(status, retry_after, model, body);
        warn!(provider, model, status, error = %err, "Provider request rejected");
        return Err(err);
    }

    response.json::<T>().await.map_err(|e| ProviderError::ApiError {
        status_code: status,
        message: format!("Malformed {provider} response: {e}"),
    })
}

/// Seconds from a numeric `Retry-After` header. HTTP-date values are ignored.
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub(crate) fn status_error(
    status: u16,
    retry_after: Option<u64>,
    model: &str,
    body: String,
) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        401 | 403 => ProviderError::AuthenticationFailed(if body.is_empty() {
            "Invalid API key or insufficient permissions".into()
        } else {
            body
        }),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}
