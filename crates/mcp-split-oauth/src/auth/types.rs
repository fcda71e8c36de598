//! Grant-state records held by the authorization server.
//!
//! All records carry absolute `chrono` timestamps so introspection can
//! report `exp`/`iat` without conversion. Expiry is checked on every read;
//! the background sweep only reclaims memory.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::defaults;

/// Generate an opaque secret using two UUIDs (256 bits, hex).
pub(crate) fn generate_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// A registered OAuth client (RFC 7591). Also serialized as the
/// registration response echo.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistration {
    /// Issued client identifier.
    pub client_id: String,

    /// Issued secret; `None` for public clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable client name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Exact-match redirect URIs.
    pub redirect_uris: Vec<String>,

    /// Grant types the client may use.
    pub grant_types: Vec<String>,

    /// Scope string requested at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// How the client authenticates at the token endpoint (`none` for
    /// public clients).
    pub token_endpoint_auth_method: String,

    /// Registration time as unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub client_id_issued_at: DateTime<Utc>,
}

impl ClientRegistration {
    /// Whether `redirect_uri` is registered for this client (exact match).
    #[must_use]
    pub fn redirect_allowed(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Whether this client must present a secret at the token endpoint.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}

/// An authorization request waiting for the resource owner to log in.
///
/// Keyed by a server-minted transaction id, never by the client's `state`.
/// Survives failed login attempts; consumed on success or expiry.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Server-minted lookup key, carried through the login form.
    pub txn_id: String,

    /// Requesting client.
    pub client_id: String,

    /// Validated redirect URI for the final redirect.
    pub redirect_uri: String,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// PKCE S256 challenge to bind into the code.
    pub code_challenge: String,

    /// Client-supplied CSRF nonce, echoed back on redirect.
    pub state: String,

    /// Requested resource indicator (RFC 8707), if any.
    pub resource: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.created_at + Duration::seconds(defaults::PENDING_AUTH_TTL_SECS)
    }
}

/// A single-use authorization code.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// The opaque code value.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Redirect URI the code was issued for.
    pub redirect_uri: String,

    /// Scopes approved by the resource owner.
    pub scopes: Vec<String>,

    /// PKCE S256 challenge from the authorization request.
    pub code_challenge: String,

    /// Resource indicator carried from the authorization request.
    pub resource: Option<String>,

    /// Issue time.
    pub created_at: DateTime<Utc>,

    /// Set on first exchange; a consumed code can never mint again.
    pub consumed: bool,
}

impl AuthorizationCode {
    /// Mint a fresh code bound to the pending authorization's parameters.
    #[must_use]
    pub fn issue(pending: &PendingAuthorization) -> Self {
        Self {
            code: generate_token(),
            client_id: pending.client_id.clone(),
            redirect_uri: pending.redirect_uri.clone(),
            scopes: pending.scopes.clone(),
            code_challenge: pending.code_challenge.clone(),
            resource: pending.resource.clone(),
            created_at: Utc::now(),
            consumed: false,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.created_at + Duration::seconds(defaults::AUTH_CODE_TTL_SECS)
    }
}

/// A bearer access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The opaque token value.
    pub token: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scopes: Vec<String>,

    /// Resource the token is bound to, reported as `aud` on introspection.
    pub resource: Option<String>,

    /// Issue time, reported as `iat`.
    pub issued_at: DateTime<Utc>,

    /// Expiry time, reported as `exp`.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Mint a fresh access token for a client.
    #[must_use]
    pub fn issue(client_id: &str, scopes: Vec<String>, resource: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            token: generate_token(),
            client_id: client_id.to_owned(),
            scopes,
            resource,
            issued_at: now,
            expires_at: now + Duration::seconds(defaults::ACCESS_TOKEN_TTL_SECS),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Space-joined scope string for token and introspection responses.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// A refresh token paired with the access token it can replace.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// The opaque token value.
    pub token: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Scopes the replacement pair will carry.
    pub scopes: Vec<String>,

    /// Resource binding carried into replacement tokens.
    pub resource: Option<String>,

    /// The paired access token, revoked together on rotation.
    pub access_token: String,

    /// Issue time.
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Mint a refresh token paired with `access`.
    #[must_use]
    pub fn issue_for(access: &AccessToken) -> Self {
        Self {
            token: generate_token(),
            client_id: access.client_id.clone(),
            scopes: access.scopes.clone(),
            resource: access.resource.clone(),
            access_token: access.token.clone(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.created_at + Duration::seconds(defaults::REFRESH_TOKEN_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingAuthorization {
        PendingAuthorization {
            txn_id: "txn".to_string(),
            client_id: "client1".to_string(),
            redirect_uri: "http://localhost:3030/callback".to_string(),
            scopes: vec!["user".to_string()],
            code_challenge: "challenge".to_string(),
            state: "xyz".to_string(),
            resource: Some("http://localhost:8080".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_code_inherits_pending_parameters() {
        let code = AuthorizationCode::issue(&pending());
        assert_eq!(code.client_id, "client1");
        assert_eq!(code.redirect_uri, "http://localhost:3030/callback");
        assert_eq!(code.code_challenge, "challenge");
        assert_eq!(code.resource.as_deref(), Some("http://localhost:8080"));
        assert!(!code.consumed);
        assert!(!code.is_expired());
        assert_eq!(code.code.len(), 64);
    }

    #[test]
    fn test_expired_pending() {
        let mut record = pending();
        record.created_at = Utc::now() - Duration::seconds(defaults::PENDING_AUTH_TTL_SECS + 1);
        assert!(record.is_expired());
    }

    #[test]
    fn test_token_pair_binding() {
        let access = AccessToken::issue("client1", vec!["user".to_string()], None);
        let refresh = RefreshToken::issue_for(&access);
        assert_eq!(refresh.access_token, access.token);
        assert_eq!(refresh.client_id, "client1");
        assert_ne!(refresh.token, access.token);
        assert!(!access.is_expired());
        assert!(!refresh.is_expired());
        assert_eq!(access.scope_string(), "user");
    }

    #[test]
    fn test_redirect_allowed_exact_match() {
        let client = ClientRegistration {
            client_id: "c".to_string(),
            client_secret: None,
            client_name: None,
            redirect_uris: vec!["http://localhost:3030/callback".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            scope: None,
            token_endpoint_auth_method: "none".to_string(),
            client_id_issued_at: Utc::now(),
        };
        assert!(client.redirect_allowed("http://localhost:3030/callback"));
        assert!(!client.redirect_allowed("http://localhost:3030/callback/"));
        assert!(!client.redirect_allowed("http://localhost:3031/callback"));
        assert!(!client.is_confidential());
    }
}
