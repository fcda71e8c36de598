//! HTTP handlers for the standalone authorization server.
//!
//! Implements:
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 6749: OAuth 2.0 Authorization Code Grant with interactive login
//! - RFC 7636: PKCE (S256 only)
//! - RFC 7662: Token Introspection
//! - RFC 7009: Token Revocation
//! - RFC 8707: Resource Indicators

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use url::Url;

use super::AuthState;
use super::login::{render_error_page, render_login_page};
use super::types::{
    AccessToken, AuthorizationCode, ClientRegistration, PendingAuthorization, RefreshToken,
    generate_token,
};
use crate::error::AuthError;
use crate::metadata::{AuthorizationServerMetadata, IntrospectionResponse};
use crate::pkce;

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn server_metadata(State(state): State<Arc<AuthState>>) -> impl IntoResponse {
    Json(AuthorizationServerMetadata::for_issuer(
        &state.config.issuer,
        &state.config.supported_scopes,
    ))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
    pub scope: Option<String>,
}

/// `POST /oauth/register`
///
/// Register a new OAuth client. Clients declaring
/// `token_endpoint_auth_method: "none"` are registered as public and get no
/// secret; everyone else is issued one.
pub async fn register_client(
    State(state): State<Arc<AuthState>>,
    Json(req): Json<RegistrationRequest>,
) -> Response {
    let redirect_uris = req.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return oauth_error(&AuthError::invalid_client_metadata("redirect_uris is required"));
    }
    for uri in &redirect_uris {
        if Url::parse(uri).is_err() {
            return oauth_error(&AuthError::invalid_client_metadata(format!(
                "redirect_uri is not a valid URL: {uri}"
            )));
        }
    }

    let auth_method =
        req.token_endpoint_auth_method.unwrap_or_else(|| "client_secret_post".to_string());
    let client_secret = (auth_method != "none").then(generate_token);
    let grant_types = if req.grant_types.is_empty() {
        vec!["authorization_code".to_string(), "refresh_token".to_string()]
    } else {
        req.grant_types
    };
    if !grant_types.iter().any(|g| g == "authorization_code" || g == "refresh_token") {
        return oauth_error(&AuthError::invalid_client_metadata(
            "no supported grant type requested",
        ));
    }

    let client = ClientRegistration {
        client_id: format!("client-{}", uuid::Uuid::new_v4().simple()),
        client_secret,
        client_name: req.client_name,
        redirect_uris,
        grant_types,
        scope: req.scope,
        token_endpoint_auth_method: auth_method,
        client_id_issued_at: chrono::Utc::now(),
    };

    state.clients.put_client(client.clone()).await;

    tracing::info!(client_id = %client.client_id, "Registered OAuth client");

    (StatusCode::CREATED, Json(client)).into_response()
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub resource: Option<String>,
}

/// `GET /oauth/authorize`
///
/// Validate the authorization request and hand off to the interactive login
/// page. Client and redirect URI problems are answered directly with 400;
/// everything after that point is reported by redirecting back to the
/// registered URI with `error` and the client's `state`.
pub async fn authorize(
    State(state): State<Arc<AuthState>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let Some(client_id) = params.client_id.as_deref() else {
        return oauth_error(&AuthError::invalid_request("client_id is required"));
    };
    let Some(redirect_uri) = params.redirect_uri.as_deref() else {
        return oauth_error(&AuthError::invalid_request("redirect_uri is required"));
    };

    let Some(client) = state.clients.get_client(client_id).await else {
        return oauth_error_with(StatusCode::BAD_REQUEST, &AuthError::unknown_client(client_id));
    };
    // Never redirect to an unregistered URI.
    if !client.redirect_allowed(redirect_uri) {
        return oauth_error(&AuthError::redirect_mismatch(redirect_uri));
    }

    let Some(state_param) = params.state.as_deref() else {
        return error_redirect(
            redirect_uri,
            &AuthError::invalid_request("state is required"),
            None,
        );
    };
    if params.response_type.as_deref() != Some("code") {
        let error = AuthError::UnsupportedResponseType {
            response_type: params.response_type.clone().unwrap_or_default(),
        };
        return error_redirect(redirect_uri, &error, Some(state_param));
    }
    let Some(code_challenge) = params.code_challenge.as_deref() else {
        return error_redirect(
            redirect_uri,
            &AuthError::invalid_request("code_challenge is required"),
            Some(state_param),
        );
    };
    if params.code_challenge_method.as_deref() != Some("S256") {
        return error_redirect(
            redirect_uri,
            &AuthError::invalid_request("code_challenge_method must be 'S256'"),
            Some(state_param),
        );
    }

    let scopes = requested_scopes(params.scope.as_deref());
    if let Some(unsupported) =
        scopes.iter().find(|s| !state.config.supported_scopes.contains(s))
    {
        return error_redirect(
            redirect_uri,
            &AuthError::unsupported_scope(unsupported.as_str()),
            Some(state_param),
        );
    }

    if let Some(resource) = params.resource.as_deref() {
        if Url::parse(resource).is_err() {
            return error_redirect(
                redirect_uri,
                &AuthError::invalid_target("resource must be an absolute URI"),
                Some(state_param),
            );
        }
    }

    let pending = PendingAuthorization {
        txn_id: uuid::Uuid::new_v4().to_string(),
        client_id: client_id.to_owned(),
        redirect_uri: redirect_uri.to_owned(),
        scopes,
        code_challenge: code_challenge.to_owned(),
        state: state_param.to_owned(),
        resource: params.resource.clone(),
        created_at: chrono::Utc::now(),
    };
    let txn_id = pending.txn_id.clone();
    state.grants.put_pending(pending).await;

    tracing::info!(client_id = %client_id, "Authorization request accepted, redirecting to login");

    (StatusCode::FOUND, [("Location", format!("/login?txn={txn_id}"))]).into_response()
}

fn requested_scopes(scope: Option<&str>) -> Vec<String> {
    let scopes: Vec<String> = scope
        .unwrap_or_default()
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect();
    if scopes.is_empty() {
        vec![crate::config::defaults::REQUIRED_SCOPE.to_string()]
    } else {
        scopes
    }
}

// ─── Interactive Login ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub txn: Option<String>,
}

/// `GET /login`
pub async fn login_page(
    State(state): State<Arc<AuthState>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let Some(txn_id) = query.txn.as_deref() else {
        return (StatusCode::BAD_REQUEST, Html(render_error_page("Missing login transaction")))
            .into_response();
    };
    let Some(pending) = live_pending(&state, txn_id).await else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_error_page("Login request expired or unknown. Restart authorization.")),
        )
            .into_response();
    };

    let client_name = display_name(&state, &pending).await;
    Html(render_login_page(&client_name, txn_id, None)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub txn: String,
    pub username: String,
    pub password: String,
}

/// `POST /login/callback`
///
/// Check the submitted credentials. A wrong password re-renders the form
/// against the same pending authorization so the user can retry; success
/// consumes it, mints the single-use code, and redirects back to the client.
pub async fn login_submit(
    State(state): State<Arc<AuthState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(pending) = live_pending(&state, &form.txn).await else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_error_page("Login request expired or unknown. Restart authorization.")),
        )
            .into_response();
    };

    if !state.credentials.verify(&form.username, &form.password) {
        tracing::warn!(client_id = %pending.client_id, "Login attempt with invalid credentials");
        let client_name = display_name(&state, &pending).await;
        return Html(render_login_page(
            &client_name,
            &form.txn,
            Some("Invalid username or password"),
        ))
        .into_response();
    }

    // Consume the transaction now so the form cannot be replayed.
    let Some(pending) = state.grants.remove_pending(&form.txn).await else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_error_page("Login request already completed. Restart authorization.")),
        )
            .into_response();
    };

    let code = AuthorizationCode::issue(&pending);
    let code_value = code.code.clone();
    state.grants.put_code(code).await;

    tracing::info!(client_id = %pending.client_id, "Login succeeded, issuing authorization code");

    success_redirect(&pending.redirect_uri, &code_value, &pending.state)
}

async fn live_pending(state: &AuthState, txn_id: &str) -> Option<PendingAuthorization> {
    let pending = state.grants.get_pending(txn_id).await?;
    if pending.is_expired() {
        state.grants.remove_pending(txn_id).await;
        return None;
    }
    Some(pending)
}

async fn display_name(state: &AuthState, pending: &PendingAuthorization) -> String {
    state
        .clients
        .get_client(&pending.client_id)
        .await
        .and_then(|client| client.client_name)
        .unwrap_or_else(|| pending.client_id.clone())
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub resource: Option<String>,
}

/// `POST /oauth/token`
pub async fn token(
    State(state): State<Arc<AuthState>>,
    Form(form): Form<TokenRequest>,
) -> Response {
    match form.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(&state, &form).await,
        "refresh_token" => refresh_token_grant(&state, &form).await,
        _ => oauth_error(&AuthError::UnsupportedGrantType { grant_type: form.grant_type.clone() }),
    }
}

async fn authorization_code_grant(state: &AuthState, form: &TokenRequest) -> Response {
    let Some(ref code) = form.code else {
        return oauth_error(&AuthError::invalid_request("code is required"));
    };
    let Some(ref code_verifier) = form.code_verifier else {
        return oauth_error(&AuthError::invalid_request("code_verifier is required"));
    };
    let client = match authenticate_client(state, form).await {
        Ok(client) => client,
        Err(err) => return oauth_error(&err),
    };

    // One-shot consume. Any failure past this point burns the code.
    let Some(auth_code) = state.grants.consume_code(code).await else {
        return oauth_error(&AuthError::invalid_grant("Invalid or expired authorization code"));
    };

    if auth_code.client_id != client.client_id {
        return oauth_error(&AuthError::invalid_grant("Code was issued to a different client"));
    }
    if form.redirect_uri.as_deref() != Some(auth_code.redirect_uri.as_str()) {
        return oauth_error(&AuthError::invalid_grant("redirect_uri mismatch"));
    }
    if !pkce::verify_s256(code_verifier, &auth_code.code_challenge) {
        return oauth_error(&AuthError::invalid_grant("PKCE verification failed"));
    }

    let resource = match (auth_code.resource.as_deref(), form.resource.as_deref()) {
        (Some(bound), Some(requested)) if bound != requested => {
            return oauth_error(&AuthError::invalid_target(
                "resource differs from the authorized resource",
            ));
        }
        (Some(bound), _) => Some(bound.to_owned()),
        (None, requested) => requested.map(ToOwned::to_owned),
    };

    let access = AccessToken::issue(&client.client_id, auth_code.scopes, resource);
    let refresh = RefreshToken::issue_for(&access);
    let response = token_success(&access, &refresh);
    state.grants.put_token_pair(access, refresh).await;

    tracing::info!(client_id = %client.client_id, "Issued token pair for authorization code");

    response
}

async fn refresh_token_grant(state: &AuthState, form: &TokenRequest) -> Response {
    let Some(ref refresh_token) = form.refresh_token else {
        return oauth_error(&AuthError::invalid_request("refresh_token is required"));
    };
    let client = match authenticate_client(state, form).await {
        Ok(client) => client,
        Err(err) => return oauth_error(&err),
    };

    // Rotation on use: the presented token is retired before validation, so
    // replaying it can never succeed.
    let Some(old) = state.grants.remove_refresh_token(refresh_token).await else {
        return oauth_error(&AuthError::invalid_grant("Invalid or expired refresh token"));
    };
    state.grants.remove_access_token(&old.access_token).await;

    if old.is_expired() {
        return oauth_error(&AuthError::invalid_grant("Invalid or expired refresh token"));
    }
    if old.client_id != client.client_id {
        return oauth_error(&AuthError::invalid_grant(
            "Refresh token was issued to a different client",
        ));
    }

    let access = AccessToken::issue(&client.client_id, old.scopes, old.resource);
    let refresh = RefreshToken::issue_for(&access);
    let response = token_success(&access, &refresh);
    state.grants.put_token_pair(access, refresh).await;

    tracing::info!(client_id = %client.client_id, "Rotated refresh token");

    response
}

/// Resolve and authenticate the client named in a token request.
///
/// Public clients identify themselves with `client_id` alone; confidential
/// clients must also present their issued secret.
async fn authenticate_client(
    state: &AuthState,
    form: &TokenRequest,
) -> Result<ClientRegistration, AuthError> {
    let Some(client_id) = form.client_id.as_deref() else {
        return Err(AuthError::invalid_request("client_id is required"));
    };
    let Some(client) = state.clients.get_client(client_id).await else {
        return Err(AuthError::unknown_client(client_id));
    };
    if client.is_confidential()
        && client.client_secret.as_deref() != form.client_secret.as_deref()
    {
        return Err(AuthError::unknown_client(client_id));
    }
    Ok(client)
}

// ─── RFC 7662: Token Introspection ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    pub token: Option<String>,
}

/// `POST /introspect`
///
/// Report token state to resource servers. Anything other than a live,
/// unexpired access token gets the bare `{"active": false}` answer with no
/// further detail.
pub async fn introspect(
    State(state): State<Arc<AuthState>>,
    Form(form): Form<IntrospectRequest>,
) -> Response {
    let Some(ref token) = form.token else {
        return (StatusCode::BAD_REQUEST, Json(IntrospectionResponse::inactive()))
            .into_response();
    };

    match state.grants.get_access_token(token).await {
        Some(access) if !access.is_expired() => Json(IntrospectionResponse {
            active: true,
            client_id: Some(access.client_id.clone()),
            scope: Some(access.scope_string()),
            exp: Some(access.expires_at.timestamp()),
            iat: Some(access.issued_at.timestamp()),
            token_type: Some("Bearer".to_string()),
            aud: access.resource.map(crate::metadata::Audience::Single),
        })
        .into_response(),
        _ => Json(IntrospectionResponse::inactive()).into_response(),
    }
}

// ─── RFC 7009: Token Revocation ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    #[allow(dead_code)]
    pub token_type_hint: Option<String>,
}

/// `POST /oauth/revoke`
///
/// Revoking a refresh token also retires its paired access token. Unknown
/// tokens still get 200 per the RFC.
pub async fn revoke(
    State(state): State<Arc<AuthState>>,
    Form(form): Form<RevokeRequest>,
) -> Response {
    if state.grants.remove_access_token(&form.token).await {
        tracing::info!("Revoked access token");
    } else if let Some(refresh) = state.grants.remove_refresh_token(&form.token).await {
        state.grants.remove_access_token(&refresh.access_token).await;
        tracing::info!("Revoked refresh token and paired access token");
    }
    StatusCode::OK.into_response()
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mcp-auth-server"
    }))
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Map an [`AuthError`] to the RFC 6749 §5.2 JSON error body. Failed client
/// authentication gets 401; everything else is a 400.
fn oauth_error(error: &AuthError) -> Response {
    let status = if error.error_code() == "invalid_client" {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_REQUEST
    };
    oauth_error_with(status, error)
}

fn oauth_error_with(status: StatusCode, error: &AuthError) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": error.error_code(),
            "error_description": error.to_string()
        })),
    )
        .into_response()
}

/// Build a token response with the RFC 6749 §5.1 cache headers.
fn token_success(access: &AccessToken, refresh: &RefreshToken) -> Response {
    let expires_in = (access.expires_at - access.issued_at).num_seconds();
    let mut response = Json(serde_json::json!({
        "access_token": access.token,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "refresh_token": refresh.token,
        "scope": access.scope_string()
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

fn success_redirect(redirect_uri: &str, code: &str, state: &str) -> Response {
    redirect_with(redirect_uri, &[("code", code), ("state", state)])
}

fn error_redirect(redirect_uri: &str, error: &AuthError, state: Option<&str>) -> Response {
    let description = error.to_string();
    let mut params =
        vec![("error", error.error_code()), ("error_description", description.as_str())];
    if let Some(state) = state {
        params.push(("state", state));
    }
    redirect_with(redirect_uri, &params)
}

fn redirect_with(redirect_uri: &str, params: &[(&str, &str)]) -> Response {
    // The URI was validated as parseable at registration time.
    let Ok(mut target) = Url::parse(redirect_uri) else {
        return oauth_error(&AuthError::invalid_request("redirect_uri is not a valid URL"));
    };
    target.query_pairs_mut().extend_pairs(params);
    (StatusCode::FOUND, [("Location", target.to_string())]).into_response()
}
