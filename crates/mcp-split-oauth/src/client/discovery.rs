//! OAuth metadata discovery and dynamic client registration.
//!
//! Discovery GETs are idempotent, so they go through retry middleware and
//! a short-lived cache. Registration is a plain POST with no retries.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;

use crate::config::defaults;
use crate::error::{FlowError, FlowResult};
use crate::metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};

/// Credentials issued by dynamic client registration (RFC 7591).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Fetches well-known metadata and registers this client.
#[derive(Clone)]
pub struct DiscoveryClient {
    http: ClientWithMiddleware,
    resource_cache: Cache<String, Arc<ProtectedResourceMetadata>>,
    server_cache: Cache<String, Arc<AuthorizationServerMetadata>>,
}

impl DiscoveryClient {
    /// Create a discovery client.
    pub fn new() -> FlowResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(defaults::HTTP_TIMEOUT)
            .build()
            .map_err(FlowError::Transport)?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
            .build_with_max_retries(3);

        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let resource_cache = Cache::builder()
            .max_capacity(defaults::DISCOVERY_CACHE_MAX_SIZE)
            .time_to_live(defaults::DISCOVERY_CACHE_TTL)
            .build();
        let server_cache = Cache::builder()
            .max_capacity(defaults::DISCOVERY_CACHE_MAX_SIZE)
            .time_to_live(defaults::DISCOVERY_CACHE_TTL)
            .build();

        Ok(Self { http, resource_cache, server_cache })
    }

    /// Fetch `/.well-known/oauth-protected-resource` from a resource server.
    pub async fn protected_resource(
        &self,
        resource_base: &str,
    ) -> FlowResult<Arc<ProtectedResourceMetadata>> {
        let base = resource_base.trim_end_matches('/').to_owned();
        if let Some(cached) = self.resource_cache.get(&base).await {
            return Ok(cached);
        }

        let url = format!("{base}/.well-known/oauth-protected-resource");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FlowError::discovery(format!(
                "protected resource metadata request to {url} returned {}",
                response.status()
            )));
        }
        let metadata: ProtectedResourceMetadata = response.json().await.map_err(|error| {
            FlowError::discovery(format!("invalid metadata from {url}: {error}"))
        })?;

        let metadata = Arc::new(metadata);
        self.resource_cache.insert(base, Arc::clone(&metadata)).await;
        Ok(metadata)
    }

    /// Fetch `/.well-known/oauth-authorization-server` from an issuer.
    pub async fn authorization_server(
        &self,
        issuer: &str,
    ) -> FlowResult<Arc<AuthorizationServerMetadata>> {
        let base = issuer.trim_end_matches('/').to_owned();
        if let Some(cached) = self.server_cache.get(&base).await {
            return Ok(cached);
        }

        let url = format!("{base}/.well-known/oauth-authorization-server");
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FlowError::discovery(format!(
                "authorization server metadata request to {url} returned {}",
                response.status()
            )));
        }
        let metadata: AuthorizationServerMetadata = response.json().await.map_err(|error| {
            FlowError::discovery(format!("invalid metadata from {url}: {error}"))
        })?;

        let metadata = Arc::new(metadata);
        self.server_cache.insert(base, Arc::clone(&metadata)).await;
        Ok(metadata)
    }

    /// Register as a public client at `registration_endpoint`.
    pub async fn register(
        &self,
        registration_endpoint: &str,
        client_name: &str,
        redirect_uri: &str,
        scope: &str,
    ) -> FlowResult<ClientCredentials> {
        let body = serde_json::json!({
            "client_name": client_name,
            "redirect_uris": [redirect_uri],
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none",
            "scope": scope
        });

        let response = self.http.post(registration_endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FlowError::registration(format!(
                "registration returned {status}: {detail}"
            )));
        }

        let credentials: ClientCredentials = response.json().await.map_err(|error| {
            FlowError::registration(format!("invalid registration response: {error}"))
        })?;

        tracing::info!(client_id = %credentials.client_id, "Registered with authorization server");

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_protected_resource_metadata_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resource": server.uri(),
                "authorization_servers": ["http://localhost:9000"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let discovery = DiscoveryClient::new().unwrap();
        let first = discovery.protected_resource(&server.uri()).await.unwrap();
        let second = discovery.protected_resource(&server.uri()).await.unwrap();
        assert_eq!(first.authorization_servers, second.authorization_servers);
        assert_eq!(first.authorization_servers, vec!["http://localhost:9000".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_metadata_is_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let discovery = DiscoveryClient::new().unwrap();
        let result = discovery.authorization_server(&server.uri()).await;
        assert!(matches!(result, Err(FlowError::Discovery { .. })));
    }

    #[tokio::test]
    async fn test_registration_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "client-abc",
                "redirect_uris": ["http://localhost:3030/callback"],
                "grant_types": ["authorization_code", "refresh_token"],
                "token_endpoint_auth_method": "none"
            })))
            .mount(&server)
            .await;

        let discovery = DiscoveryClient::new().unwrap();
        let credentials = discovery
            .register(
                &format!("{}/oauth/register", server.uri()),
                "demo-client",
                "http://localhost:3030/callback",
                "user",
            )
            .await
            .unwrap();
        assert_eq!(credentials.client_id, "client-abc");
        assert!(credentials.client_secret.is_none());
    }

    #[tokio::test]
    async fn test_rejected_registration_is_registration_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/register"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_client_metadata"
            })))
            .mount(&server)
            .await;

        let discovery = DiscoveryClient::new().unwrap();
        let result = discovery
            .register(&format!("{}/oauth/register", server.uri()), "demo", "bad", "user")
            .await;
        assert!(matches!(result, Err(FlowError::Registration { .. })));
    }
}
