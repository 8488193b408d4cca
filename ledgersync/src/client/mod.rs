//! Resilient client for the remote accounting API.
//!
//! [`ApiClient`] layers authentication, retry, and pagination on top of an
//! [`ApiTransport`]. Failures resolve into [`ErrorKind`] classes: an expired
//! session surfaces as [`ErrorKind::AuthExpired`] after exactly one refresh
//! attempt, retryable statuses are resolved by capped exponential backoff, and
//! a run that exhausts the attempt ceiling ends with
//! [`ErrorKind::TransportExhausted`].

pub mod backoff;
pub mod transport;

use config::Environment;
use config::shared::ApiClientConfig;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::backoff::BackoffPolicy;
use crate::client::transport::{ApiRequest, ApiResponse, ApiTransport, Body};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::query::ParsedQuery;
use crate::session::{SessionStore, TokenRefresher};
use crate::sync_error;

/// Pagination overrides for a single query call. Values here win over
/// pagination clauses embedded in the query text.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// 1-based offset of the first row to fetch.
    pub start_position: Option<u32>,
    /// Total row ceiling across all pages.
    pub max_results: Option<u32>,
}

/// Aggregated result of a paginated read-query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Canonical entity name the rows belong to.
    pub entity: String,
    /// Entity objects in service order, concatenated across pages.
    pub rows: Vec<Value>,
    /// Populated for `COUNT(*)` queries instead of rows.
    pub total_count: Option<u64>,
    /// Number of pages fetched.
    pub pages: u32,
    /// True when rows likely remain server-side: the row or page ceiling was
    /// hit while the service was still returning full pages.
    pub has_more: bool,
    /// 1-based start offset to resume from when [`Self::has_more`] is set.
    pub next_start_position: Option<u32>,
}

/// Client for the remote accounting API.
///
/// Generic over the transport, session store, and token refresher so that
/// tests can script each seam independently.
#[derive(Debug, Clone)]
pub struct ApiClient<T, S, R> {
    transport: T,
    session: S,
    refresher: R,
    environment: Environment,
    config: ApiClientConfig,
    backoff: BackoffPolicy,
}

impl<T, S, R> ApiClient<T, S, R>
where
    T: ApiTransport,
    S: SessionStore,
    R: TokenRefresher,
{
    pub fn new(
        transport: T,
        session: S,
        refresher: R,
        environment: Environment,
        config: ApiClientConfig,
    ) -> Self {
        let backoff = BackoffPolicy::from_millis(config.base_delay_ms, config.max_delay_ms);

        Self {
            transport,
            session,
            refresher,
            environment,
            config,
            backoff,
        }
    }

    /// Hostname of the remote API for the configured environment.
    fn host(&self) -> &'static str {
        match self.environment {
            Environment::Sandbox => "sandbox-quickbooks.api.intuit.com",
            Environment::Production => "quickbooks.api.intuit.com",
        }
    }

    /// Runs a read-query, paginating until the result set is exhausted, the
    /// caller's row ceiling is met, or the page ceiling is hit.
    pub async fn query(&self, parsed: &ParsedQuery, options: QueryOptions) -> SyncResult<QueryResult> {
        let realm_id = self.session.realm_id().await?;
        let base_query = parsed.without_pagination();

        if is_count_query(parsed) {
            let response = self.fetch(self.query_request(&realm_id, &base_query)?).await?;
            let body = response.json()?;
            let total_count = body["QueryResponse"]["totalCount"].as_u64();

            return Ok(QueryResult {
                entity: parsed.entity.clone(),
                rows: Vec::new(),
                total_count,
                pages: 1,
                has_more: false,
                next_start_position: None,
            });
        }

        let mut start = options
            .start_position
            .or(parsed.start_position)
            .unwrap_or(1);
        let mut remaining = options.max_results.or(parsed.max_results);
        let mut rows = Vec::new();
        let mut pages = 0u32;
        let mut has_more = false;
        let mut next_start = start;

        loop {
            let page_size = match remaining {
                Some(remaining) => remaining.min(self.config.page_size),
                None => self.config.page_size,
            };
            if page_size == 0 {
                break;
            }

            let text = format!("{base_query} STARTPOSITION {start} MAXRESULTS {page_size}");
            let response = self.fetch(self.query_request(&realm_id, &text)?).await?;
            let body = response.json()?;
            pages += 1;

            let page_rows = match body["QueryResponse"][parsed.entity.as_str()].as_array() {
                Some(array) => array.clone(),
                None => Vec::new(),
            };
            let returned = page_rows.len() as u32;
            rows.extend(page_rows);
            next_start = start + returned;

            debug!(
                entity = %parsed.entity,
                page = pages,
                returned,
                "fetched query page"
            );

            // A short page means the result set is exhausted.
            if returned < page_size {
                break;
            }

            if let Some(left) = remaining {
                let left = left.saturating_sub(returned);
                if left == 0 {
                    // The row ceiling was met on a full page, so the service
                    // may hold more; hand the caller a continuation point.
                    has_more = true;
                    break;
                }
                remaining = Some(left);
            }

            if pages >= self.config.max_pages {
                warn!(
                    entity = %parsed.entity,
                    pages,
                    "query stopped at the page ceiling with results remaining"
                );
                has_more = true;
                break;
            }

            start = next_start;
        }

        Ok(QueryResult {
            entity: parsed.entity.clone(),
            rows,
            total_count: None,
            pages,
            has_more,
            next_start_position: has_more.then_some(next_start),
        })
    }

    /// Fetches a standard report with filter parameters.
    pub async fn report(
        &self,
        report: &str,
        filters: impl IntoIterator<Item = (String, String)>,
    ) -> SyncResult<Value> {
        let realm_id = self.session.realm_id().await?;

        let mut url = self.base_url(&realm_id, &format!("reports/{report}"))?;
        for (key, value) in filters {
            url.query_pairs_mut().append_pair(&key, &value);
        }

        let response = self.fetch(ApiRequest::get(url.as_str())).await?;
        response.json()
    }

    /// Fetches the connected company's profile record.
    pub async fn company_info(&self) -> SyncResult<Value> {
        let realm_id = self.session.realm_id().await?;

        let url = self.base_url(&realm_id, &format!("companyinfo/{realm_id}"))?;
        let response = self.fetch(ApiRequest::get(url.as_str())).await?;
        let body = response.json()?;

        Ok(body["CompanyInfo"].clone())
    }

    fn base_url(&self, realm_id: &str, path: &str) -> SyncResult<reqwest::Url> {
        let raw = format!("https://{}/v3/company/{realm_id}/{path}", self.host());
        let mut url = reqwest::Url::parse(&raw).map_err(|err| {
            sync_error!(ErrorKind::ConfigError, "Invalid remote API URL").with_source(err)
        })?;
        url.query_pairs_mut()
            .append_pair("minorversion", &self.config.minor_version.to_string());

        Ok(url)
    }

    /// Builds the request for one query page. Short queries ride inline on the
    /// URL; queries past the inline limit switch to a raw-body POST, which the
    /// service accepts for arbitrarily long query text.
    fn query_request(&self, realm_id: &str, text: &str) -> SyncResult<ApiRequest> {
        let mut url = self.base_url(realm_id, "query")?;

        if text.len() <= self.config.inline_query_limit {
            url.query_pairs_mut().append_pair("query", text);
            Ok(ApiRequest::get(url.as_str()))
        } else {
            Ok(ApiRequest::post(url.as_str(), Body::Text(text.to_string())))
        }
    }

    /// Sends a request, resolving authentication and retryable failures.
    ///
    /// A 401 triggers exactly one token refresh, which does not count against
    /// the attempt ceiling; a missing access token spends that same refresh
    /// before the first send; a second 401 invalidates the session. Rate limits
    /// and transient server failures back off and retry until the configured
    /// ceiling, then surface as [`ErrorKind::TransportExhausted`]. Any other
    /// non-success status is terminal.
    pub async fn fetch(&self, request: ApiRequest) -> SyncResult<ApiResponse> {
        let mut refreshed = false;
        let mut token = match self.session.access_token().await? {
            Some(token) => token,
            None => {
                // No cached access token; spend the one permitted refresh up
                // front instead of waiting for a 401.
                refreshed = true;
                self.refresh_session().await?
            }
        };
        let mut attempt = 0u32;

        loop {
            let response = self.transport.send(request.clone(), &token).await?;
            if response.is_success() {
                return Ok(response);
            }

            match response.status {
                401 => {
                    if refreshed {
                        self.session.invalidate().await?;
                        return Err(sync_error!(
                            ErrorKind::AuthExpired,
                            "Authorization failed after token refresh; reconnect required"
                        ));
                    }
                    refreshed = true;
                    token = self.refresh_session().await?;
                }
                status @ (429 | 500..=599) => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        return Err(sync_error!(
                            ErrorKind::TransportExhausted,
                            "Retry attempts exhausted",
                            format!("last status {status}")
                        ));
                    }

                    let delay = self.backoff.jittered_delay(attempt - 1, response.retry_after);
                    let kind = if status == 429 {
                        ErrorKind::RateLimited
                    } else {
                        ErrorKind::ServerTransient
                    };
                    debug!(status, attempt, delay_ms = delay.as_millis() as u64, ?kind, "retrying request");
                    tokio::time::sleep(delay).await;
                }
                status => {
                    return Err(fault_error(status, &response.body));
                }
            }
        }
    }

    /// Exchanges the refresh token for a new pair and persists it. Any failure
    /// along the way invalidates the session.
    async fn refresh_session(&self) -> SyncResult<SecretString> {
        let refresh_token = match self.session.refresh_token().await? {
            Some(token) => token,
            None => {
                self.session.invalidate().await?;
                return Err(sync_error!(
                    ErrorKind::AuthExpired,
                    "No refresh token; reconnect required"
                ));
            }
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                let access = pair.access.clone();
                self.session.store_tokens(pair).await?;
                Ok(access)
            }
            Err(err) => {
                self.session.invalidate().await?;
                Err(sync_error!(
                    ErrorKind::AuthExpired,
                    "Token refresh failed; reconnect required",
                    err.user_message()
                ))
            }
        }
    }
}

fn is_count_query(parsed: &ParsedQuery) -> bool {
    parsed.select.len() == 1 && parsed.select[0].eq_ignore_ascii_case("count(*)")
}

/// Maps a terminal non-success status to a [`SyncError`], extracting the
/// service's fault message when the body carries one.
fn fault_error(status: u16, body: &str) -> SyncError {
    if let Some((message, detail)) = parse_fault(body) {
        let detail = match detail {
            Some(detail) if detail != message => format!("{message}: {detail}"),
            _ => message,
        };
        return sync_error!(
            ErrorKind::ValidationError,
            "Request rejected by the remote service",
            detail
        );
    }

    sync_error!(
        ErrorKind::ValidationError,
        "Request rejected by the remote service",
        format!("request failed ({status})")
    )
}

/// Extracts `(Message, Detail)` from a service fault body, if present.
fn parse_fault(body: &str) -> Option<(String, Option<String>)> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value["Fault"]["Error"].as_array()?.first()?;
    let message = error["Message"].as_str()?.to_string();
    let detail = error["Detail"].as_str().map(str::to_string);

    Some((message, detail))
}
