//! Standalone OAuth 2.0 authorization server.
//!
//! Runs as its own process, separate from any resource server. Resource
//! servers point clients here for authorization and call back over HTTP to
//! introspect the bearer tokens they receive.
//!
//! ## Supported Standards
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 6749: Authorization Code Grant with interactive login
//! - RFC 7636: PKCE (S256)
//! - RFC 7662: Token Introspection
//! - RFC 7009: Token Revocation
//! - RFC 8707: Resource Indicators

pub mod credentials;
pub mod handlers;
pub mod login;
pub mod store;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AuthServerConfig;
pub use credentials::CredentialStore;
pub use store::{ClientStore, GrantStore, MemoryStore, start_cleanup_task};

/// Shared state for authorization server handlers.
pub struct AuthState {
    pub config: AuthServerConfig,
    pub clients: Arc<dyn ClientStore>,
    pub grants: Arc<dyn GrantStore>,
    pub credentials: CredentialStore,
}

/// The authorization server: owns its stores and serves the OAuth routes.
pub struct AuthorizationServer {
    state: Arc<AuthState>,
}

impl AuthorizationServer {
    /// Build a server backed by fresh in-memory stores and the demo
    /// credential account from `config`.
    #[must_use]
    pub fn new(config: AuthServerConfig) -> Self {
        let store = MemoryStore::new();
        let credentials =
            CredentialStore::new(config.demo_username.clone(), config.demo_password.clone());
        Self::with_stores(config, Arc::new(store.clone()), Arc::new(store), credentials)
    }

    /// Build a server over caller-provided storage backends.
    #[must_use]
    pub fn with_stores(
        config: AuthServerConfig,
        clients: Arc<dyn ClientStore>,
        grants: Arc<dyn GrantStore>,
        credentials: CredentialStore,
    ) -> Self {
        Self { state: Arc::new(AuthState { config, clients, grants, credentials }) }
    }

    /// Create the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/.well-known/oauth-authorization-server",
                get(handlers::server_metadata),
            )
            .route("/oauth/register", post(handlers::register_client))
            .route("/oauth/authorize", get(handlers::authorize))
            .route("/login", get(handlers::login_page))
            .route("/login/callback", post(handlers::login_submit))
            .route("/oauth/token", post(handlers::token))
            .route("/introspect", post(handlers::introspect))
            .route("/oauth/revoke", post(handlers::revoke))
            .route("/health", get(handlers::health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(
            issuer = %self.state.config.issuer,
            "Authorization server listening on {addr}"
        );
        self.serve(listener).await
    }

    /// Serve on an already-bound listener. Used by tests to bind port 0.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        start_cleanup_task(Arc::clone(&self.state.grants));
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
