//! OAuth discovery and introspection documents shared across the deployment.
//!
//! The authorization server serializes these, the resource server and client
//! deserialize them. Fields the demo server always emits are still optional
//! on the consuming side where RFC 8414 allows omission.

use serde::{Deserialize, Serialize};

/// RFC 8414 authorization server metadata, served at
/// `/.well-known/oauth-authorization-server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier URI.
    pub issuer: String,

    /// Authorization endpoint (RFC 6749 section 3.1).
    pub authorization_endpoint: String,

    /// Token endpoint (RFC 6749 section 3.2).
    pub token_endpoint: String,

    /// Token introspection endpoint (RFC 7662).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,

    /// Dynamic client registration endpoint (RFC 7591).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Token revocation endpoint (RFC 7009).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,

    /// Supported `response_type` values.
    pub response_types_supported: Vec<String>,

    /// Supported `grant_type` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// Supported PKCE challenge methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Scopes this server can grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Client authentication methods accepted at the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Client authentication methods accepted at the introspection endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Client authentication methods accepted at the revocation endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint_auth_methods_supported: Option<Vec<String>>,
}

impl AuthorizationServerMetadata {
    /// Build the document this deployment serves for the given issuer.
    #[must_use]
    pub fn for_issuer(issuer: &str, scopes: &[String]) -> Self {
        let base = issuer.trim_end_matches('/');
        Self {
            issuer: base.to_string(),
            authorization_endpoint: format!("{base}/oauth/authorize"),
            token_endpoint: format!("{base}/oauth/token"),
            introspection_endpoint: Some(format!("{base}/introspect")),
            registration_endpoint: Some(format!("{base}/oauth/register")),
            revocation_endpoint: Some(format!("{base}/oauth/revoke")),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: Some(vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ]),
            code_challenge_methods_supported: Some(vec!["S256".to_string()]),
            scopes_supported: Some(scopes.to_vec()),
            token_endpoint_auth_methods_supported: Some(vec![
                "client_secret_post".to_string(),
                "client_secret_basic".to_string(),
            ]),
            introspection_endpoint_auth_methods_supported: Some(vec![
                "client_secret_post".to_string(),
            ]),
            revocation_endpoint_auth_methods_supported: Some(vec![
                "client_secret_post".to_string(),
            ]),
        }
    }
}

/// RFC 9728 protected resource metadata, served at
/// `/.well-known/oauth-protected-resource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The URI of the protected resource itself.
    pub resource: String,

    /// Authorization server issuer URIs protecting this resource.
    pub authorization_servers: Vec<String>,

    /// Scopes this resource understands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported bearer presentation methods (always `["header"]` here).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,
}

/// The `aud` claim of an introspection response: a single resource or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// Token minted for one resource.
    Single(String),
    /// Token minted for several resources.
    Many(Vec<String>),
}

impl Audience {
    /// Iterate the audience entries regardless of wire shape.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::Single(aud) => std::slice::from_ref(aud).iter().map(String::as_str),
            Self::Many(auds) => auds.as_slice().iter().map(String::as_str),
        }
    }
}

/// RFC 7662 introspection response.
///
/// Inactive tokens carry `active: false` and nothing else; active tokens
/// carry the full claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently valid.
    pub active: bool,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Space-separated granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Expiry as unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issue time as unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Token type, `Bearer` for everything this server mints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Resource(s) the token was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
}

impl IntrospectionResponse {
    /// The response for an unknown, expired, or revoked token.
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            client_id: None,
            scope: None,
            exp: None,
            iat: None,
            token_type: None,
            aud: None,
        }
    }
}
