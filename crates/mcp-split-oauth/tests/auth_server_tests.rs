//! Integration tests for the authorization server's HTTP endpoints.
//!
//! Drives the real router with tower's oneshot, walking the same steps a
//! browser and client would: register, authorize, log in, exchange,
//! introspect, refresh, revoke.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use mcp_split_oauth::auth::types::{AccessToken, RefreshToken};
use mcp_split_oauth::auth::{AuthorizationServer, CredentialStore, GrantStore, MemoryStore};
use mcp_split_oauth::config::AuthServerConfig;

const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CALLBACK: &str = "http://localhost:3030/callback";

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn build_server() -> (axum::Router, MemoryStore) {
    let store = MemoryStore::new();
    let server = AuthorizationServer::with_stores(
        AuthServerConfig::for_testing(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        CredentialStore::default(),
    );
    (server.router(), store)
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap()
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::post(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn post_form(
    app: &axum::Router,
    uri: &str,
    params: &[(&str, &str)],
) -> axum::response::Response {
    let body = serde_urlencoded::to_string(params).unwrap();
    app.clone()
        .oneshot(
            Request::post(uri)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string()
}

fn query_map(target: &str) -> HashMap<String, String> {
    let absolute = if target.starts_with('/') {
        format!("http://testserver{target}")
    } else {
        target.to_string()
    };
    url::Url::parse(&absolute).unwrap().query_pairs().into_owned().collect()
}

async fn register_public_client(app: &axum::Router) -> String {
    let response = post_json(
        app,
        "/oauth/register",
        json!({
            "client_name": "Test Client",
            "redirect_uris": [CALLBACK],
            "token_endpoint_auth_method": "none"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["client_id"].as_str().unwrap().to_string()
}

fn authorize_uri(client_id: &str, challenge: &str, state: &str, extra: &str) -> String {
    format!(
        "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=http%3A%2F%2Flocalhost%3A3030%2Fcallback&code_challenge={challenge}&code_challenge_method=S256&state={state}&scope=user{extra}"
    )
}

/// Walk authorize + login, returning the code from the final redirect.
async fn obtain_code(app: &axum::Router, client_id: &str, state: &str, extra: &str) -> String {
    let response =
        get(app, &authorize_uri(client_id, &challenge_for(VERIFIER), state, extra)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let login_target = location(&response);
    assert!(login_target.starts_with("/login?txn="));
    let txn = query_map(&login_target)["txn"].clone();

    let response = post_form(
        app,
        "/login/callback",
        &[("txn", txn.as_str()), ("username", "demo_user"), ("password", "demo_password")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let callback_target = location(&response);
    assert!(callback_target.starts_with(CALLBACK));
    let params = query_map(&callback_target);
    assert_eq!(params["state"], state);
    params["code"].clone()
}

async fn exchange(
    app: &axum::Router,
    client_id: &str,
    code: &str,
    verifier: &str,
) -> axum::response::Response {
    post_form(
        app,
        "/oauth/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", CALLBACK),
            ("client_id", client_id),
            ("code_verifier", verifier),
        ],
    )
    .await
}

#[tokio::test]
async fn test_metadata_document() {
    let (app, _) = build_server();
    let response = get(&app, "/.well-known/oauth-authorization-server").await;
    assert_eq!(response.status(), StatusCode::OK);

    let metadata = body_json(response).await;
    assert_eq!(metadata["issuer"], "http://localhost:9000");
    assert_eq!(metadata["authorization_endpoint"], "http://localhost:9000/oauth/authorize");
    assert_eq!(metadata["token_endpoint"], "http://localhost:9000/oauth/token");
    assert_eq!(metadata["introspection_endpoint"], "http://localhost:9000/introspect");
    assert_eq!(metadata["registration_endpoint"], "http://localhost:9000/oauth/register");
    assert_eq!(metadata["revocation_endpoint"], "http://localhost:9000/oauth/revoke");
    assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256"]));
    assert_eq!(
        metadata["grant_types_supported"],
        json!(["authorization_code", "refresh_token"])
    );
    assert_eq!(metadata["response_types_supported"], json!(["code"]));
}

#[tokio::test]
async fn test_register_public_and_confidential_clients() {
    let (app, _) = build_server();

    let response = post_json(
        &app,
        "/oauth/register",
        json!({"client_name": "Public", "redirect_uris": [CALLBACK], "token_endpoint_auth_method": "none"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let public = body_json(response).await;
    assert!(public["client_id"].as_str().unwrap().starts_with("client-"));
    assert!(public.get("client_secret").is_none());

    let response = post_json(
        &app,
        "/oauth/register",
        json!({"client_name": "Confidential", "redirect_uris": [CALLBACK]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let confidential = body_json(response).await;
    assert!(confidential["client_secret"].as_str().unwrap().len() >= 32);
    assert_eq!(confidential["token_endpoint_auth_method"], "client_secret_post");
}

#[tokio::test]
async fn test_register_requires_redirect_uris() {
    let (app, _) = build_server();
    let response = post_json(&app, "/oauth/register", json!({"client_name": "No URIs"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_client_metadata");
}

#[tokio::test]
async fn test_register_rejects_unsupported_grant_types() {
    let (app, _) = build_server();
    let response = post_json(
        &app,
        "/oauth/register",
        json!({"redirect_uris": [CALLBACK], "grant_types": ["implicit"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_client_metadata");
}

#[tokio::test]
async fn test_authorize_unknown_client_gets_400_not_redirect() {
    let (app, _) = build_server();
    let response =
        get(&app, &authorize_uri("client-missing", &challenge_for(VERIFIER), "xyz", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(body_json(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorize_unregistered_redirect_gets_400_not_redirect() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=http%3A%2F%2Fevil.example%2Fsteal&code_challenge={}&code_challenge_method=S256&state=xyz&scope=user",
        challenge_for(VERIFIER)
    );
    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_rejects_plain_challenge_method() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;

    let uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=http%3A%2F%2Flocalhost%3A3030%2Fcallback&code_challenge=abc&code_challenge_method=plain&state=xyz&scope=user"
    );
    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let params = query_map(&location(&response));
    assert_eq!(params["error"], "invalid_request");
    assert_eq!(params["state"], "xyz");
}

#[tokio::test]
async fn test_authorize_rejects_unsupported_scope() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;

    let response = get(
        &app,
        &format!(
            "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=http%3A%2F%2Flocalhost%3A3030%2Fcallback&code_challenge={}&code_challenge_method=S256&state=xyz&scope=admin",
            challenge_for(VERIFIER)
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let params = query_map(&location(&response));
    assert_eq!(params["error"], "invalid_scope");
    assert_eq!(params["state"], "xyz");
}

#[tokio::test]
async fn test_login_page_renders_for_pending_authorization() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;

    let response =
        get(&app, &authorize_uri(&client_id, &challenge_for(VERIFIER), "xyz", "")).await;
    let txn = query_map(&location(&response))["txn"].clone();

    let response = get(&app, &format!("/login?txn={txn}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Test Client"));
    assert!(html.contains(&format!(r#"name="txn" value="{txn}""#)));
}

#[tokio::test]
async fn test_login_page_rejects_unknown_txn() {
    let (app, _) = build_server();
    let response = get(&app, "/login?txn=nonsense").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("expired or unknown"));
}

#[tokio::test]
async fn test_wrong_credentials_allow_retry_on_same_transaction() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;

    let response =
        get(&app, &authorize_uri(&client_id, &challenge_for(VERIFIER), "xyz", "")).await;
    let txn = query_map(&location(&response))["txn"].clone();

    let response = post_form(
        &app,
        "/login/callback",
        &[("txn", txn.as_str()), ("username", "demo_user"), ("password", "wrong")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Invalid username or password"));

    // Pending authorization survived the failed attempt.
    let response = post_form(
        &app,
        "/login/callback",
        &[("txn", txn.as_str()), ("username", "demo_user"), ("password", "demo_password")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).contains("code="));
}

#[tokio::test]
async fn test_full_flow_issues_token_pair() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;

    let response = exchange(&app, &client_id, &code, VERIFIER).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");

    let tokens = body_json(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert_eq!(tokens["scope"], "user");
    assert_eq!(tokens["access_token"].as_str().unwrap().len(), 64);
    assert_eq!(tokens["refresh_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_code_is_single_use() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;

    let first = exchange(&app, &client_id, &code, VERIFIER).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = exchange(&app, &client_id, &code, VERIFIER).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(second).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_wrong_verifier_burns_the_code() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;

    let bad = exchange(&app, &client_id, &code, "wrong-verifier-wrong-verifier-wrong-verif").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad).await["error"], "invalid_grant");

    // The failed attempt consumed the code; the right verifier is too late.
    let retry = exchange(&app, &client_id, &code, VERIFIER).await;
    assert_eq!(retry.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exchange_checks_redirect_uri_binding() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;

    let response = post_form(
        &app,
        "/oauth/token",
        &[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", "http://localhost:3031/callback"),
            ("client_id", client_id.as_str()),
            ("code_verifier", VERIFIER),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_exchange_checks_client_binding() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let other_client = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;

    let response = exchange(&app, &other_client, &code, VERIFIER).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_refresh_rotates_and_retires_old_pair() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;
    let tokens = body_json(exchange(&app, &client_id, &code, VERIFIER).await).await;
    let old_access = tokens["access_token"].as_str().unwrap().to_string();
    let old_refresh = tokens["refresh_token"].as_str().unwrap().to_string();

    let response = post_form(
        &app,
        "/oauth/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", old_refresh.as_str()),
            ("client_id", client_id.as_str()),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    assert_ne!(rotated["access_token"].as_str().unwrap(), old_access);
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), old_refresh);

    // Replaying the rotated-out refresh token fails.
    let replay = post_form(
        &app,
        "/oauth/token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", old_refresh.as_str()),
            ("client_id", client_id.as_str()),
        ],
    )
    .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(replay).await["error"], "invalid_grant");

    // The old access token died with the rotation.
    let introspection =
        body_json(post_form(&app, "/introspect", &[("token", old_access.as_str())]).await).await;
    assert_eq!(introspection["active"], false);
}

#[tokio::test]
async fn test_introspect_reports_active_token() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;
    let tokens = body_json(exchange(&app, &client_id, &code, VERIFIER).await).await;
    let access = tokens["access_token"].as_str().unwrap();

    let response = post_form(&app, "/introspect", &[("token", access)]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let introspection = body_json(response).await;
    assert_eq!(introspection["active"], true);
    assert_eq!(introspection["client_id"], client_id);
    assert_eq!(introspection["scope"], "user");
    assert_eq!(introspection["token_type"], "Bearer");
    assert!(introspection["exp"].as_i64().unwrap() > introspection["iat"].as_i64().unwrap());
}

#[tokio::test]
async fn test_introspect_unknown_token_is_bare_inactive() {
    let (app, _) = build_server();
    let response = post_form(&app, "/introspect", &[("token", "no-such-token")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"active": false}));
}

#[tokio::test]
async fn test_introspect_missing_token_is_bad_request() {
    let (app, _) = build_server();
    let response = post_form(&app, "/introspect", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["active"], false);
}

#[tokio::test]
async fn test_introspect_expired_token_is_inactive() {
    let (app, store) = build_server();

    let mut access = AccessToken::issue("client-x", vec!["user".to_string()], None);
    access.expires_at = Utc::now() - Duration::seconds(10);
    let token = access.token.clone();
    let refresh = RefreshToken::issue_for(&access);
    store.put_token_pair(access, refresh).await;

    let response = post_form(&app, "/introspect", &[("token", token.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"active": false}));
}

#[tokio::test]
async fn test_resource_parameter_becomes_audience() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(
        &app,
        &client_id,
        "xyz",
        "&resource=http%3A%2F%2Flocalhost%3A8080",
    )
    .await;
    let tokens = body_json(exchange(&app, &client_id, &code, VERIFIER).await).await;
    let access = tokens["access_token"].as_str().unwrap();

    let introspection =
        body_json(post_form(&app, "/introspect", &[("token", access)]).await).await;
    assert_eq!(introspection["active"], true);
    assert_eq!(introspection["aud"], "http://localhost:8080");
}

#[tokio::test]
async fn test_revoke_access_token() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;
    let tokens = body_json(exchange(&app, &client_id, &code, VERIFIER).await).await;
    let access = tokens["access_token"].as_str().unwrap().to_string();

    let response = post_form(&app, "/oauth/revoke", &[("token", access.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let introspection =
        body_json(post_form(&app, "/introspect", &[("token", access.as_str())]).await).await;
    assert_eq!(introspection["active"], false);

    // Unknown tokens still answer 200.
    let response = post_form(&app, "/oauth/revoke", &[("token", "never-issued")]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_revoke_refresh_retires_paired_access() {
    let (app, _) = build_server();
    let client_id = register_public_client(&app).await;
    let code = obtain_code(&app, &client_id, "xyz", "").await;
    let tokens = body_json(exchange(&app, &client_id, &code, VERIFIER).await).await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();

    post_form(&app, "/oauth/revoke", &[("token", refresh.as_str())]).await;

    let introspection =
        body_json(post_form(&app, "/introspect", &[("token", access.as_str())]).await).await;
    assert_eq!(introspection["active"], false);
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let (app, _) = build_server();
    let response =
        post_form(&app, "/oauth/token", &[("grant_type", "client_credentials")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_health() {
    let (app, _) = build_server();
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}
