//! Storage seams for the authorization server.
//!
//! Handlers talk to [`ClientStore`] and [`GrantStore`] trait objects so a
//! persistent backend can be dropped in later. [`MemoryStore`] is the
//! bundled backend: one `RwLock`-guarded map per record type, shared via
//! cheap clones.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::auth::types::{
    AccessToken, AuthorizationCode, ClientRegistration, PendingAuthorization, RefreshToken,
};
use crate::config::defaults;

/// Registered-client lookup.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a registration under its `client_id`.
    async fn put_client(&self, client: ClientRegistration);

    /// Fetch a registration by `client_id`.
    async fn get_client(&self, client_id: &str) -> Option<ClientRegistration>;
}

/// Grant-state storage: pending authorizations, codes, and token pairs.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Store a pending authorization under its transaction id.
    async fn put_pending(&self, pending: PendingAuthorization);

    /// Fetch a pending authorization without consuming it.
    async fn get_pending(&self, txn_id: &str) -> Option<PendingAuthorization>;

    /// Remove and return a pending authorization.
    async fn remove_pending(&self, txn_id: &str) -> Option<PendingAuthorization>;

    /// Store a freshly minted authorization code.
    async fn put_code(&self, code: AuthorizationCode);

    /// Atomically consume an authorization code.
    ///
    /// Returns `None` if the code is unknown, already consumed, or expired.
    /// The consumed flag is set under the same write lock that reads it, so
    /// two concurrent exchanges can never both succeed.
    async fn consume_code(&self, code: &str) -> Option<AuthorizationCode>;

    /// Store an access token and its paired refresh token.
    async fn put_token_pair(&self, access: AccessToken, refresh: RefreshToken);

    /// Fetch an access token by value.
    async fn get_access_token(&self, token: &str) -> Option<AccessToken>;

    /// Remove an access token. Returns whether it existed.
    async fn remove_access_token(&self, token: &str) -> bool;

    /// Remove and return a refresh token. Used both for rotation and
    /// revocation; the caller decides what happens to the paired access
    /// token.
    async fn remove_refresh_token(&self, token: &str) -> Option<RefreshToken>;

    /// Drop expired pending authorizations, codes, and tokens.
    async fn sweep_expired(&self);
}

/// In-memory backend for both storage traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    clients: Arc<RwLock<HashMap<String, ClientRegistration>>>,
    pending: Arc<RwLock<HashMap<String, PendingAuthorization>>>,
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn put_client(&self, client: ClientRegistration) {
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    async fn get_client(&self, client_id: &str) -> Option<ClientRegistration> {
        self.clients.read().await.get(client_id).cloned()
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn put_pending(&self, pending: PendingAuthorization) {
        self.pending.write().await.insert(pending.txn_id.clone(), pending);
    }

    async fn get_pending(&self, txn_id: &str) -> Option<PendingAuthorization> {
        self.pending.read().await.get(txn_id).cloned()
    }

    async fn remove_pending(&self, txn_id: &str) -> Option<PendingAuthorization> {
        self.pending.write().await.remove(txn_id)
    }

    async fn put_code(&self, code: AuthorizationCode) {
        self.codes.write().await.insert(code.code.clone(), code);
    }

    async fn consume_code(&self, code: &str) -> Option<AuthorizationCode> {
        let mut codes = self.codes.write().await;
        let record = codes.get_mut(code)?;
        if record.consumed || record.is_expired() {
            return None;
        }
        record.consumed = true;
        Some(record.clone())
    }

    async fn put_token_pair(&self, access: AccessToken, refresh: RefreshToken) {
        self.access_tokens.write().await.insert(access.token.clone(), access);
        self.refresh_tokens.write().await.insert(refresh.token.clone(), refresh);
    }

    async fn get_access_token(&self, token: &str) -> Option<AccessToken> {
        self.access_tokens.read().await.get(token).cloned()
    }

    async fn remove_access_token(&self, token: &str) -> bool {
        self.access_tokens.write().await.remove(token).is_some()
    }

    async fn remove_refresh_token(&self, token: &str) -> Option<RefreshToken> {
        self.refresh_tokens.write().await.remove(token)
    }

    async fn sweep_expired(&self) {
        let removed_pending = {
            let mut pending = self.pending.write().await;
            let before = pending.len();
            pending.retain(|_, record| !record.is_expired());
            before - pending.len()
        };
        let removed_codes = {
            let mut codes = self.codes.write().await;
            let before = codes.len();
            codes.retain(|_, record| !record.is_expired() && !record.consumed);
            before - codes.len()
        };
        let removed_access = {
            let mut tokens = self.access_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, record| !record.is_expired());
            before - tokens.len()
        };
        let removed_refresh = {
            let mut tokens = self.refresh_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, record| !record.is_expired());
            before - tokens.len()
        };
        if removed_pending + removed_codes + removed_access + removed_refresh > 0 {
            tracing::debug!(
                pending = removed_pending,
                codes = removed_codes,
                access_tokens = removed_access,
                refresh_tokens = removed_refresh,
                "Swept expired grant state"
            );
        }
    }
}

/// Spawn the periodic sweep for expired grant state.
pub fn start_cleanup_task(grants: Arc<dyn GrantStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(defaults::CLEANUP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            grants.sweep_expired().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::types::generate_token;

    fn pending(txn_id: &str) -> PendingAuthorization {
        PendingAuthorization {
            txn_id: txn_id.to_string(),
            client_id: "client1".to_string(),
            redirect_uri: "http://localhost:3030/callback".to_string(),
            scopes: vec!["user".to_string()],
            code_challenge: "challenge".to_string(),
            state: "xyz".to_string(),
            resource: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_code_consumed_exactly_once() {
        let store = MemoryStore::new();
        let code = AuthorizationCode::issue(&pending("txn1"));
        let value = code.code.clone();
        store.put_code(code).await;

        let first = store.consume_code(&value).await;
        assert!(first.is_some());
        let second = store.consume_code(&value).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_expired_code_not_consumable() {
        let store = MemoryStore::new();
        let mut code = AuthorizationCode::issue(&pending("txn1"));
        code.created_at = Utc::now() - Duration::seconds(defaults::AUTH_CODE_TTL_SECS + 1);
        let value = code.code.clone();
        store.put_code(code).await;

        assert!(store.consume_code(&value).await.is_none());
    }

    #[tokio::test]
    async fn test_pending_lookup_and_removal() {
        let store = MemoryStore::new();
        store.put_pending(pending("txn1")).await;

        assert!(store.get_pending("txn1").await.is_some());
        assert!(store.get_pending("txn1").await.is_some());
        assert!(store.remove_pending("txn1").await.is_some());
        assert!(store.get_pending("txn1").await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_removal_exposes_paired_access() {
        let store = MemoryStore::new();
        let access = AccessToken::issue("client1", vec!["user".to_string()], None);
        let refresh = RefreshToken::issue_for(&access);
        let access_value = access.token.clone();
        let refresh_value = refresh.token.clone();
        store.put_token_pair(access, refresh).await;

        let taken = store.remove_refresh_token(&refresh_value).await;
        assert!(taken.is_some());
        assert_eq!(taken.map(|r| r.access_token), Some(access_value.clone()));
        assert!(store.remove_refresh_token(&refresh_value).await.is_none());
        assert!(store.remove_access_token(&access_value).await);
        assert!(!store.remove_access_token(&access_value).await);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_and_consumed() {
        let store = MemoryStore::new();

        let mut stale = pending("stale");
        stale.created_at = Utc::now() - Duration::seconds(defaults::PENDING_AUTH_TTL_SECS + 1);
        store.put_pending(stale).await;
        store.put_pending(pending("fresh")).await;

        let code = AuthorizationCode::issue(&pending("fresh"));
        let consumed = code.code.clone();
        store.put_code(code).await;
        store.consume_code(&consumed).await;

        let mut expired = AccessToken::issue("client1", vec!["user".to_string()], None);
        expired.expires_at = Utc::now() - Duration::seconds(1);
        let expired_value = expired.token.clone();
        let live = AccessToken::issue("client1", vec!["user".to_string()], None);
        let live_value = live.token.clone();
        store.put_token_pair(expired.clone(), RefreshToken::issue_for(&expired)).await;
        store.put_token_pair(live.clone(), RefreshToken::issue_for(&live)).await;

        store.sweep_expired().await;

        assert!(store.get_pending("stale").await.is_none());
        assert!(store.get_pending("fresh").await.is_some());
        assert!(store.get_access_token(&expired_value).await.is_none());
        assert!(store.get_access_token(&live_value).await.is_some());
    }

    #[test]
    fn test_generated_tokens_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
