//! Shared helpers for unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::client::transport::{ApiRequest, ApiResponse, ApiTransport};
use crate::error::{ErrorKind, SyncResult};
use crate::session::{TokenPair, TokenRefresher};
use crate::sync_error;

/// Transport that replays a scripted sequence of responses and records every
/// request it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<ApiResponse>>>,
    requests: Arc<Mutex<Vec<ScriptedRequest>>>,
}

/// A request the scripted transport observed, with the bearer token it was
/// sent under.
#[derive(Debug, Clone)]
pub struct ScriptedRequest {
    pub request: ApiRequest,
    pub token: String,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with the given status and body.
    pub fn push(&self, status: u16, body: impl Into<String>) {
        self.push_with_retry_after(status, body, None);
    }

    /// Queues a response carrying a `Retry-After` hint.
    pub fn push_with_retry_after(
        &self,
        status: u16,
        body: impl Into<String>,
        retry_after: Option<Duration>,
    ) {
        self.responses.lock().unwrap().push_back(ApiResponse {
            status,
            retry_after,
            body: body.into(),
        });
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<ScriptedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ApiTransport for ScriptedTransport {
    async fn send(
        &self,
        request: ApiRequest,
        access_token: &SecretString,
    ) -> SyncResult<ApiResponse> {
        self.requests.lock().unwrap().push(ScriptedRequest {
            request,
            token: access_token.expose_secret().to_string(),
        });

        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            sync_error!(
                ErrorKind::Unknown,
                "Scripted transport ran out of responses"
            )
        })
    }
}

/// Refresher that always hands out the same fresh token pair.
#[derive(Debug, Clone)]
pub struct StaticRefresher {
    access: String,
    refresh: String,
    calls: Arc<Mutex<u32>>,
}

impl StaticRefresher {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl TokenRefresher for StaticRefresher {
    async fn refresh(&self, _refresh_token: &SecretString) -> SyncResult<TokenPair> {
        *self.calls.lock().unwrap() += 1;

        Ok(TokenPair::new(self.access.clone(), self.refresh.clone()))
    }
}

/// Refresher whose exchange always fails, simulating a revoked session.
#[derive(Debug, Default)]
pub struct RevokedRefresher;

impl TokenRefresher for RevokedRefresher {
    async fn refresh(&self, _refresh_token: &SecretString) -> SyncResult<TokenPair> {
        Err(sync_error!(
            ErrorKind::AuthExpired,
            "Refresh token revoked"
        ))
    }
}

/// Builds a query response body for the given entity rows.
pub fn query_response_body(entity: &str, rows: &[Value]) -> String {
    let mut query_response = serde_json::Map::new();
    query_response.insert(entity.to_string(), Value::Array(rows.to_vec()));
    query_response.insert("startPosition".to_string(), json!(1));
    query_response.insert("maxResults".to_string(), json!(rows.len()));

    json!({
        "QueryResponse": query_response,
        "time": "2026-01-05T09:30:00.000-08:00"
    })
    .to_string()
}

/// Builds a company-info response body.
pub fn company_info_body(company_name: &str) -> String {
    json!({
        "CompanyInfo": {
            "CompanyName": company_name,
            "Country": "US",
        },
        "time": "2026-01-05T09:30:00.000-08:00"
    })
    .to_string()
}

/// Builds a `COUNT(*)` query response body.
pub fn count_response_body(total: u64) -> String {
    json!({
        "QueryResponse": { "totalCount": total },
        "time": "2026-01-05T09:30:00.000-08:00"
    })
    .to_string()
}

/// Builds a service fault body.
pub fn fault_body(message: &str, detail: &str) -> String {
    json!({
        "Fault": {
            "Error": [{ "Message": message, "Detail": detail, "code": "4001" }],
            "type": "ValidationFault"
        },
        "time": "2026-01-05T09:30:00.000-08:00"
    })
    .to_string()
}
