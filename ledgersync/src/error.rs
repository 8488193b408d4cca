//! Error types and result definitions for dataset execution.
//!
//! Provides a classified error system for the engine: every failure carries an
//! [`ErrorKind`] that retry logic and callers can pattern-match on, a static
//! description, optional dynamic detail (usually the service-reported fault
//! message), and the callsite location where the error was raised.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for engine operations using [`SyncError`] as the error type.
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for dataset execution and scheduling operations.
///
/// [`SyncError`] separates the retryable transport classes (resolved inside the
/// API client) from the terminal remainder that reaches the job runner and the
/// scheduler. The kind is the contract; the description and detail are for
/// humans.
#[derive(Debug, Clone)]
pub struct SyncError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Specific categories of errors that can occur during dataset execution.
///
/// Retry logic in the API client matches on kind rather than on status-code
/// literals; everything outside the retryable classes is terminal for a run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Authentication
    /// Authorization failed even after one token refresh; the session is invalid.
    AuthExpired,

    // Retryable transport classes (resolved inside the API client)
    /// The remote service rate-limited the request (429-equivalent).
    RateLimited,
    /// The remote service failed transiently (5xx-equivalent).
    ServerTransient,
    /// The retry attempt ceiling was reached without a successful response.
    TransportExhausted,

    // Caller errors
    /// A query, dataset, or request shape was rejected before or by the service.
    ValidationError,
    /// The output exceeds the hard cell ceiling.
    SizingError,
    /// A dataset, job, or sheet was not found.
    NotFound,
    /// A scheduled run was skipped because the realm lock was held.
    LockContention,
    /// The host refused to create another recurring trigger.
    TriggerLimitExceeded,

    // Ambient
    /// Configuration is missing or inconsistent.
    ConfigError,
    /// A record or payload failed to serialize.
    SerializationError,
    /// A record or payload failed to deserialize.
    DeserializationError,
    /// An operation was attempted in a state that does not permit it.
    InvalidState,
    /// The document surface rejected a sheet or range operation.
    SheetError,

    /// Uncategorized failure.
    Unknown,
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    ///
    /// For service-reported failures this is the fault message/detail extracted
    /// from the response body.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns the message shown to users: the description, joined with the
    /// service-reported detail when one was captured.
    ///
    /// Unlike [`fmt::Display`], this omits the kind and callsite, which are
    /// diagnostics rather than user-facing content.
    pub fn user_message(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {}", self.description, detail),
            None => self.description.to_string(),
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`SyncError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        self.kind == other.kind
    }
}

impl Hash for SyncError {
    /// Hashes the error using only its stable identifying components.
    ///
    /// Only the kind and static description participate, intentionally excluding
    /// location, detail, and source so that errors of the same category produce
    /// the same hash for grouping and deduplication.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.description.hash(state);
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`serde_json::Error`] to [`SyncError`] with the appropriate error kind.
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => {
                (ErrorKind::SerializationError, "JSON I/O operation failed")
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        let source = Arc::new(err);
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`reqwest::Error`] to [`SyncError`].
///
/// Network-level failures (connect, timeout, body read) are classified as
/// [`ErrorKind::ServerTransient`] so the client's retry loop treats them like a
/// server error; everything else is [`ErrorKind::Unknown`].
impl From<reqwest::Error> for SyncError {
    #[track_caller]
    fn from(err: reqwest::Error) -> SyncError {
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            ErrorKind::ServerTransient
        } else {
            ErrorKind::Unknown
        };

        let detail = err.to_string();
        let source = Arc::new(err);
        SyncError::from_components(
            kind,
            Cow::Borrowed("HTTP transport failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_error;

    #[test]
    fn kind_and_detail_are_preserved() {
        let err = sync_error!(
            ErrorKind::ValidationError,
            "Query rejected",
            "unknown entity `Gadget`"
        );

        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.detail(), Some("unknown entity `Gadget`"));
        assert_eq!(
            err.user_message(),
            "Query rejected: unknown entity `Gadget`"
        );
    }

    #[test]
    fn errors_compare_by_kind() {
        let a = sync_error!(ErrorKind::RateLimited, "Rate limited");
        let b = sync_error!(ErrorKind::RateLimited, "Another description");
        assert_eq!(a, b);
    }

    #[test]
    fn display_includes_location() {
        let err = sync_error!(ErrorKind::NotFound, "Dataset not found");
        let rendered = err.to_string();
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains("error.rs"));
    }
}
