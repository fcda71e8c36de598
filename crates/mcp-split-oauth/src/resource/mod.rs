//! MCP resource server protected by remote token introspection.
//!
//! Serves a small JSON-RPC tool surface at `/mcp`. Every request must carry
//! a bearer token, which is verified against the authorization server
//! before the request body is even parsed. The server keeps no token state
//! of its own.

pub mod tools;
pub mod verifier;

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json, RequestPartsExt, Router,
    extract::{FromRequestParts, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ResourceConfig;
use crate::error::VerifyError;
use crate::metadata::ProtectedResourceMetadata;
pub use tools::{Tool, register_tools};
pub use verifier::{IntrospectionVerifier, Principal};

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
            id,
        }
    }
}

/// Tool info for the tools/list response.
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Shared state for resource server handlers.
pub struct ResourceState {
    pub config: ResourceConfig,
    pub verifier: IntrospectionVerifier,
    pub tools: Vec<Box<dyn Tool>>,
}

/// The resource server: introspection-gated MCP tools over HTTP.
pub struct ResourceServer {
    state: Arc<ResourceState>,
}

impl ResourceServer {
    /// Build a server from configuration. Fails if the introspection
    /// endpoint is unacceptable to the verifier.
    pub fn new(config: ResourceConfig) -> anyhow::Result<Self> {
        let verifier = IntrospectionVerifier::new(&config)?;
        let tools = register_tools(&config.server_name);
        Ok(Self { state: Arc::new(ResourceState { config, verifier, tools }) })
    }

    /// Create the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/.well-known/oauth-protected-resource",
                get(protected_resource_metadata),
            )
            .route("/mcp", post(handle_mcp))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(
            resource = %self.state.config.resource_url,
            auth_server = %self.state.config.auth_server_url,
            "Resource server listening on {addr}"
        );
        self.serve(listener).await
    }

    /// Serve on an already-bound listener. Used by tests to bind port 0.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
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

// ─── Bearer Authentication ───────────────────────────────────────────────────

impl FromRequestParts<Arc<ResourceState>> for Principal {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ResourceState>,
    ) -> Result<Self, Self::Rejection> {
        let Ok(TypedHeader(Authorization(bearer))) =
            parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        else {
            return Err(unauthorized(&state.config, "invalid_request", "Bearer token required"));
        };

        state.verifier.verify(bearer.token()).await.map_err(|error| match error {
            VerifyError::Unauthenticated { ref reason } => {
                unauthorized(&state.config, "invalid_token", reason)
            }
            VerifyError::AudienceMismatch { ref audience } => unauthorized(
                &state.config,
                "invalid_token",
                &format!("Token audience does not cover this resource: {audience}"),
            ),
            VerifyError::InsufficientScope { ref required } => {
                forbidden(&state.config, required)
            }
        })
    }
}

/// 401 with the RFC 9728 pointer at our protected resource metadata.
fn unauthorized(config: &ResourceConfig, error: &str, description: &str) -> Response {
    let resource_url = &config.resource_url;
    let challenge = format!(
        "Bearer resource_metadata=\"{resource_url}/.well-known/oauth-protected-resource\", error=\"{error}\""
    );
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

fn forbidden(config: &ResourceConfig, required_scope: &str) -> Response {
    let resource_url = &config.resource_url;
    let challenge = format!(
        "Bearer resource_metadata=\"{resource_url}/.well-known/oauth-protected-resource\", error=\"insufficient_scope\", scope=\"{required_scope}\""
    );
    let mut response = (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "insufficient_scope",
            "error_description": format!("Token is missing required scope: {required_scope}")
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /.well-known/oauth-protected-resource` (RFC 9728)
async fn protected_resource_metadata(State(state): State<Arc<ResourceState>>) -> impl IntoResponse {
    Json(ProtectedResourceMetadata {
        resource: state.config.resource_url.clone(),
        authorization_servers: vec![state.config.auth_server_url.clone()],
        scopes_supported: Some(state.config.required_scopes.clone()),
        bearer_methods_supported: Some(vec!["header".to_string()]),
    })
}

/// `POST /mcp`
///
/// The [`Principal`] extractor rejects unauthenticated requests before the
/// JSON-RPC body is touched.
async fn handle_mcp(
    State(state): State<Arc<ResourceState>>,
    principal: Principal,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    tracing::debug!(method = %req.method, client_id = %principal.client_id, "Handling MCP request");

    let is_notification = req.id.is_none();

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(req.id, handle_initialize(&req.params, &state)),
        "notifications/initialized" | "initialized" | "notifications/cancelled" => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::success(req.id, serde_json::json!({}))
        }
        "ping" => JsonRpcResponse::success(req.id, serde_json::json!({})),
        "tools/list" => handle_tools_list(req.id, &state.tools),
        "tools/call" => handle_tools_call(req.id, &req.params, &state).await,
        _ => {
            if is_notification {
                return StatusCode::ACCEPTED.into_response();
            }
            JsonRpcResponse::error(req.id, -32601, format!("Method not found: {}", req.method))
        }
    };

    Json(response).into_response()
}

fn handle_initialize(params: &serde_json::Value, state: &ResourceState) -> serde_json::Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("2025-03-26");

    tracing::info!("MCP initialize: protocol version {protocol_version}");

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": state.config.server_name,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list(id: Option<serde_json::Value>, tools: &[Box<dyn Tool>]) -> JsonRpcResponse {
    let tool_list: Vec<ToolInfo> = tools
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect();

    JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_list }))
}

async fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    state: &ResourceState,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, -32602, "Missing 'name' parameter");
    };

    let arguments = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));

    let Some(tool) = state.tools.iter().find(|t| t.name() == tool_name) else {
        return JsonRpcResponse::error(id, -32602, format!("Tool not found: {tool_name}"));
    };

    tracing::info!(tool = %tool_name, "Executing tool");

    match tool.execute(arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result
                }],
                "isError": false
            }),
        ),
        Err(e) => {
            tracing::error!(tool = %tool_name, error = %e, "Tool execution failed");
            JsonRpcResponse::error(id, -32000, format!("Tool error: {e}"))
        }
    }
}

/// `GET /health`
async fn health(State(state): State<Arc<ResourceState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.server_name,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
