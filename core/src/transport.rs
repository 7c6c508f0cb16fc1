//! Executing `HttpRequest`s over the network.
//!
//! # Design
//! The clients never perform I/O. `HttpTransport` is the seam where a host
//! plugs in its HTTP stack; `ReqwestTransport` is the default. Non-2xx
//! responses are returned as data, not errors, so status interpretation
//! stays with the `parse_*` methods.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Maximum length of response body to log.
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Executes one request and returns the raw response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request).await
    }
}

/// `HttpTransport` backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(to_reqwest(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to send request: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response body: {e}")))?;

        if !(200..300).contains(&status) {
            tracing::warn!("API error: {} - {}", status, sanitize_for_log(&body));
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Truncate long bodies and drop control characters before logging.
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{head}... [truncated, {} bytes total]", body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control(), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_truncates_on_char_boundaries() {
        let body = "é".repeat(MAX_LOG_BODY_LENGTH + 10);
        let logged = sanitize_for_log(&body);
        assert!(logged.starts_with(&"é".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(logged.contains("truncated"));
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("line\nbreak\r"), "linebreak");
    }

    #[test]
    fn transport_builds_from_default_config() {
        assert!(ReqwestTransport::new(&ClientConfig::default()).is_ok());
    }
}
