//! Session and credential state for the connected company.
//!
//! The engine assumes a single logical account (one connected company) per
//! session: a realm identifier plus the current access/refresh token pair.
//! Token refresh is delegated to a [`TokenRefresher`] so the client never
//! holds OAuth client credentials itself.

use std::future::Future;
use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// The current access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::new(access.into()),
            refresh: SecretString::new(refresh.into()),
        }
    }
}

/// Trait for the persisted session state of the connected account.
///
/// Implementations wrap whatever key-value store the host provides. The store
/// holds the realm (company) identifier and the token pair; invalidation clears
/// the tokens but keeps the realm so the user can re-authorize.
pub trait SessionStore {
    /// Returns the current access token, if a session is established.
    fn access_token(&self) -> impl Future<Output = SyncResult<Option<SecretString>>> + Send;

    /// Returns the current refresh token, if a session is established.
    fn refresh_token(&self) -> impl Future<Output = SyncResult<Option<SecretString>>> + Send;

    /// Stores a freshly obtained token pair.
    fn store_tokens(&self, pair: TokenPair) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the connected realm (company) identifier.
    ///
    /// Fails with [`ErrorKind::NotFound`] when no company is connected.
    fn realm_id(&self) -> impl Future<Output = SyncResult<String>> + Send;

    /// Clears the token pair, forcing re-authorization.
    fn invalidate(&self) -> impl Future<Output = SyncResult<()>> + Send;
}

/// Trait for exchanging a refresh token for a new token pair.
pub trait TokenRefresher {
    /// Exchanges the refresh token for a fresh pair.
    ///
    /// A failed exchange is terminal for the session and surfaces as
    /// [`ErrorKind::AuthExpired`].
    fn refresh(
        &self,
        refresh_token: &SecretString,
    ) -> impl Future<Output = SyncResult<TokenPair>> + Send;
}

#[derive(Debug)]
struct SessionInner {
    realm_id: Option<String>,
    // Stored separately, matching a host key-value store where either entry
    // can be evicted on its own.
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// In-memory session store.
///
/// Keeps the realm id and token pair in process memory. Used by tests and by
/// deployments where the host injects session state at startup.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<SessionInner>>,
}

impl MemorySessionStore {
    /// Creates a disconnected session store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                realm_id: None,
                access: None,
                refresh: None,
            })),
        }
    }

    /// Creates a connected session with the given realm and token pair.
    pub fn connected(realm_id: impl Into<String>, tokens: TokenPair) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                realm_id: Some(realm_id.into()),
                access: Some(tokens.access),
                refresh: Some(tokens.refresh),
            })),
        }
    }

    /// True when the token pair has been cleared.
    pub async fn is_invalidated(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.access.is_none() && inner.refresh.is_none()
    }

    /// Drops only the access token, as happens when the host's cache evicts
    /// the short-lived entry while the refresh token persists.
    pub async fn drop_access_token(&self) {
        self.inner.lock().await.access = None;
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    async fn access_token(&self) -> SyncResult<Option<SecretString>> {
        let inner = self.inner.lock().await;

        Ok(inner.access.clone())
    }

    async fn refresh_token(&self) -> SyncResult<Option<SecretString>> {
        let inner = self.inner.lock().await;

        Ok(inner.refresh.clone())
    }

    async fn store_tokens(&self, pair: TokenPair) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.access = Some(pair.access);
        inner.refresh = Some(pair.refresh);

        Ok(())
    }

    async fn realm_id(&self) -> SyncResult<String> {
        let inner = self.inner.lock().await;

        inner
            .realm_id
            .clone()
            .ok_or_else(|| sync_error!(ErrorKind::NotFound, "No company is connected"))
    }

    async fn invalidate(&self) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.access = None;
        inner.refresh = None;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn connected_session_exposes_tokens() {
        let store = MemorySessionStore::connected("4620816365", TokenPair::new("at", "rt"));

        let access = store.access_token().await.unwrap().unwrap();
        assert_eq!(access.expose_secret(), "at");
        assert_eq!(store.realm_id().await.unwrap(), "4620816365");
    }

    #[tokio::test]
    async fn invalidate_clears_tokens_but_keeps_realm() {
        let store = MemorySessionStore::connected("123", TokenPair::new("at", "rt"));

        store.invalidate().await.unwrap();

        assert!(store.access_token().await.unwrap().is_none());
        assert!(store.is_invalidated().await);
        assert_eq!(store.realm_id().await.unwrap(), "123");
    }

    #[tokio::test]
    async fn dropping_the_access_token_keeps_the_refresh_token() {
        let store = MemorySessionStore::connected("123", TokenPair::new("at", "rt"));

        store.drop_access_token().await;

        assert!(store.access_token().await.unwrap().is_none());
        assert!(store.refresh_token().await.unwrap().is_some());
        assert!(!store.is_invalidated().await);
    }

    #[tokio::test]
    async fn disconnected_session_has_no_realm() {
        let store = MemorySessionStore::new();
        let err = store.realm_id().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
