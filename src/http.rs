use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::utils;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unable to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// A decoded backend reply. `body` is `Value::Null` when the payload is not JSON.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// `success` flag from the body, looked up at the root.
    pub fn success_flag(&self) -> Option<bool> {
        self.body.get("success").and_then(Value::as_bool)
    }

    pub fn message(&self) -> Option<String> {
        backend_message(&self.body)
    }
}

/// Finds a human-readable message at the root or under `data`.
pub fn backend_message(body: &Value) -> Option<String> {
    let scopes = [Some(body), body.get("data")];
    for scope in scopes.into_iter().flatten() {
        for key in ["message", "error", "detail"] {
            if let Some(text) = scope.get(key).and_then(Value::as_str) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!("event-checkout/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                log::warn!("falling back to default http client: {err}");
                Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        utils::join_url(&self.base_url, path)
    }

    /// Appends each value as its own percent-encoded path segment, so a slug
    /// holding `/`, `?` or `#` cannot change the endpoint being called.
    pub fn endpoint_with(&self, path: &str, segments: &[&str]) -> String {
        let joined = self.endpoint(path);
        let mut url = match Url::parse(&joined) {
            Ok(url) => url,
            Err(err) => {
                log::warn!("unable to parse endpoint {joined}: {err}");
                return utils::join_url(&joined, &segments.join("/"));
            }
        };
        if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty().extend(segments);
        }
        url.into()
    }

    /// Uses a backend-supplied URL when present, resolving relative ones
    /// against the API base; otherwise falls back to `default_url`.
    pub fn resolve_url(&self, supplied: Option<&str>, default_url: &str) -> String {
        match supplied.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) if utils::is_absolute_url(url) => url.to_string(),
            Some(relative) => self.endpoint(relative),
            None => default_url.to_string(),
        }
    }

    pub async fn get_json(&self, url: &str) -> Result<ApiResponse, HttpError> {
        log::debug!("GET {url}");
        let request = self.client.get(url).header("accept", "application/json");
        self.execute(url, request).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<ApiResponse, HttpError> {
        log::debug!("POST {url}");
        let request = self
            .client
            .post(url)
            .header("accept", "application/json")
            .json(body);
        self.execute(url, request).await
    }

    async fn execute(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse, HttpError> {
        let response = request.send().await.map_err(|err| HttpError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|err| HttpError::Body {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|err| {
                log::debug!("non-json body from {url} ({status}): {err}");
                Value::Null
            })
        };
        log::debug!("{status} from {url}");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_url_prefers_supplied_urls() {
        let client = ApiClient::new("https://api.test/api/");
        assert_eq!(
            client.resolve_url(Some("https://pay.test/gateway/1"), "ignored"),
            "https://pay.test/gateway/1"
        );
        assert_eq!(
            client.resolve_url(Some("/EventManagement/x"), "ignored"),
            "https://api.test/api/EventManagement/x"
        );
        let fallback = client.endpoint("EventManagement/default");
        assert_eq!(
            client.resolve_url(Some("  "), &fallback),
            "https://api.test/api/EventManagement/default"
        );
    }

    #[test]
    fn endpoint_segments_are_percent_encoded() {
        let client = ApiClient::new("https://api.test/api/");
        assert_eq!(
            client.endpoint_with("EventManagement/Website/events", &["forensic-conclave-2025"]),
            "https://api.test/api/EventManagement/Website/events/forensic-conclave-2025"
        );
        assert_eq!(
            client.endpoint_with("EventManagement/Website/register", &["a b/c?d#e", "31"]),
            "https://api.test/api/EventManagement/Website/register/a%20b%2Fc%3Fd%23e/31"
        );
    }

    #[test]
    fn backend_message_checks_root_then_data() {
        assert_eq!(
            backend_message(&json!({"message": " Seats full "})).as_deref(),
            Some("Seats full")
        );
        assert_eq!(
            backend_message(&json!({"data": {"error": "Duplicate email"}})).as_deref(),
            Some("Duplicate email")
        );
        assert_eq!(backend_message(&json!({"message": ""})), None);
    }
}
