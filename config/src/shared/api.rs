use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the resilient remote API client.
///
/// Controls retry behavior, pagination defaults, and the transport-selection
/// threshold for read-queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiClientConfig {
    /// Maximum number of request attempts before a retryable failure becomes terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay, in milliseconds, for exponential retry backoff.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound, in milliseconds, on a single backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Minor version query parameter appended to every request.
    #[serde(default = "default_minor_version")]
    pub minor_version: u16,
    /// Default page size for paginated read-queries.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Ceiling on the number of pages fetched for a single aggregated query.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Serialized query length above which the client switches from an inline
    /// query-string GET to a raw-body POST.
    #[serde(default = "default_inline_query_limit")]
    pub inline_query_limit: usize,
}

impl ApiClientConfig {
    /// Default maximum number of request attempts.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Default backoff base delay in milliseconds.
    pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

    /// Default backoff delay cap in milliseconds.
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

    /// Default remote API minor version.
    pub const DEFAULT_MINOR_VERSION: u16 = 65;

    /// Default page size for read-queries.
    pub const DEFAULT_PAGE_SIZE: u32 = 1000;

    /// Default page ceiling for aggregated read-queries.
    pub const DEFAULT_MAX_PAGES: u32 = 100;

    /// Default inline query length threshold, matching the remote service's URL limits.
    pub const DEFAULT_INLINE_QUERY_LIMIT: usize = 2000;

    /// Validates API client configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "client.max_attempts",
                constraint: "must be greater than 0",
            });
        }

        if self.page_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "client.page_size",
                constraint: "must be greater than 0",
            });
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "client.max_delay_ms",
                constraint: "must not be smaller than base_delay_ms",
            });
        }

        Ok(())
    }
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            minor_version: default_minor_version(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            inline_query_limit: default_inline_query_limit(),
        }
    }
}

fn default_max_attempts() -> u32 {
    ApiClientConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    ApiClientConfig::DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    ApiClientConfig::DEFAULT_MAX_DELAY_MS
}

fn default_minor_version() -> u16 {
    ApiClientConfig::DEFAULT_MINOR_VERSION
}

fn default_page_size() -> u32 {
    ApiClientConfig::DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    ApiClientConfig::DEFAULT_MAX_PAGES
}

fn default_inline_query_limit() -> usize {
    ApiClientConfig::DEFAULT_INLINE_QUERY_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ApiClientConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = ApiClientConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
