//! Authenticated JSON-RPC calls against the resource server's MCP endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};

use crate::config::defaults;
use crate::error::{FlowError, FlowResult};

/// One entry from a tools/list response.
#[derive(Debug, Clone)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Bearer-authenticated MCP caller.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a caller for `{server_url}/mcp`.
    pub fn new(server_url: &str) -> FlowResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(defaults::HTTP_TIMEOUT)
            .build()
            .map_err(FlowError::Transport)?;
        Ok(Self {
            http,
            endpoint: format!("{}/mcp", server_url.trim_end_matches('/')),
            next_id: AtomicU64::new(1),
        })
    }

    /// Send one JSON-RPC request and unwrap its result.
    ///
    /// A 401 from the server comes back as [`FlowError::Unauthorized`] so
    /// the caller can re-authenticate and retry.
    pub async fn call(&self, token: &str, method: &str, params: Value) -> FlowResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let response =
            self.http.post(&self.endpoint).bearer_auth(token).json(&body).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FlowError::Unauthorized);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FlowError::protocol(format!("MCP endpoint returned {status}: {detail}")));
        }

        let envelope: Value = response.json().await?;
        if let Some(error) = envelope.get("error") {
            let message =
                error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(FlowError::protocol(format!("{method} failed: {message}")));
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a JSON-RPC notification (no id, no result expected).
    pub async fn notify(&self, token: &str, method: &str) -> FlowResult<()> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {}
        });
        let response =
            self.http.post(&self.endpoint).bearer_auth(token).json(&body).send().await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FlowError::Unauthorized);
        }
        Ok(())
    }

    /// Run the MCP initialize handshake, bounded by the session timeout.
    pub async fn initialize(&self, token: &str) -> FlowResult<Value> {
        let handshake = async {
            let result = self
                .call(
                    token,
                    "initialize",
                    json!({
                        "protocolVersion": "2025-03-26",
                        "capabilities": {},
                        "clientInfo": {
                            "name": "mcp-split-oauth-client",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    }),
                )
                .await?;
            self.notify(token, "notifications/initialized").await?;
            Ok(result)
        };
        match tokio::time::timeout(defaults::SESSION_INIT_TIMEOUT, handshake).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::Timeout(defaults::SESSION_INIT_TIMEOUT)),
        }
    }

    /// List the tools the server offers.
    pub async fn list_tools(&self, token: &str) -> FlowResult<Vec<ToolSummary>> {
        let result = self.call(token, "tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| FlowError::protocol("tools/list result is missing 'tools'"))?;
        Ok(tools
            .iter()
            .map(|tool| ToolSummary {
                name: tool.get("name").and_then(Value::as_str).unwrap_or_default().to_owned(),
                description: tool
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            })
            .collect())
    }

    /// Invoke a named tool with JSON arguments.
    pub async fn call_tool(&self, token: &str, name: &str, arguments: Value) -> FlowResult<Value> {
        self.call(token, "tools/call", json!({ "name": name, "arguments": arguments })).await
    }
}
