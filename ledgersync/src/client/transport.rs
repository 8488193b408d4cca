//! HTTP transport abstraction for the remote API client.
//!
//! The client's retry, auth, and pagination logic is written against the
//! [`ApiTransport`] trait so tests can script responses without a network.
//! [`HttpTransport`] is the production implementation on top of `reqwest`.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};

use crate::error::SyncResult;

/// HTTP method used by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request body variants the remote API accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// JSON payload, `application/json`.
    Json(serde_json::Value),
    /// Raw query text, `application/text`.
    Text(String),
}

/// A single request to the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL including query parameters.
    pub url: String,
    pub body: Option<Body>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Body) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// A response from the remote API, decoded down to the pieces retry and
/// fault-extraction logic needs.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// `Retry-After` delay, when the service sent one.
    pub retry_after: Option<Duration>,
    /// Raw response body text.
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> SyncResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Trait for sending a single authorized request.
///
/// Implementations return `Ok` for any response the service produced,
/// regardless of status; only network-level failures are errors. Status
/// classification belongs to the client.
pub trait ApiTransport {
    fn send(
        &self,
        request: ApiRequest,
        access_token: &SecretString,
    ) -> impl Future<Output = SyncResult<ApiResponse>> + Send;
}

/// Production transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiTransport for HttpTransport {
    async fn send(
        &self,
        request: ApiRequest,
        access_token: &SecretString,
    ) -> SyncResult<ApiResponse> {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };

        builder = builder
            .header(ACCEPT, "application/json")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", access_token.expose_secret()),
            );

        match request.body {
            Some(Body::Json(value)) => {
                builder = builder.json(&value);
            }
            Some(Body::Text(text)) => {
                builder = builder.header(CONTENT_TYPE, "application/text").body(text);
            }
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_2xx_only() {
        let response = ApiResponse {
            status: 204,
            retry_after: None,
            body: String::new(),
        };
        assert!(response.is_success());

        let response = ApiResponse {
            status: 429,
            retry_after: Some(Duration::from_secs(2)),
            body: String::new(),
        };
        assert!(!response.is_success());
    }

    #[test]
    fn json_decodes_body() {
        let response = ApiResponse {
            status: 200,
            retry_after: None,
            body: r#"{"ok":true}"#.to_string(),
        };
        assert_eq!(response.json().unwrap()["ok"], true);
    }
}
