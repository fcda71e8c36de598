//! Demo MCP tools served behind bearer authentication.

use std::time::Instant;

use serde_json::json;

use crate::error::{ToolError, ToolResult};

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (e.g., "echo").
    fn name(&self) -> &'static str;

    /// Tool description for the client.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult<String>;
}

/// Echoes the caller's message back.
pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Echo a message back to the caller."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult<String> {
        let message = input
            .get("message")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ToolError::validation("message", "message is required"))?;
        Ok(format!("Echo: {message}"))
    }
}

/// Reports server identity and uptime.
pub struct ServerStatusTool {
    server_name: String,
    started_at: Instant,
}

impl ServerStatusTool {
    #[must_use]
    pub fn new(server_name: impl Into<String>) -> Self {
        Self { server_name: server_name.into(), started_at: Instant::now() }
    }
}

#[async_trait::async_trait]
impl Tool for ServerStatusTool {
    fn name(&self) -> &'static str {
        "server_status"
    }

    fn description(&self) -> &'static str {
        "Report the resource server's name, uptime, and current time."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult<String> {
        let status = json!({
            "status": "ok",
            "server": self.server_name,
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "time": chrono::Utc::now().to_rfc3339()
        });
        Ok(serde_json::to_string_pretty(&status)?)
    }
}

/// Register all tools.
#[must_use]
pub fn register_tools(server_name: &str) -> Vec<Box<dyn Tool>> {
    vec![Box::new(EchoTool), Box::new(ServerStatusTool::new(server_name))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_message() {
        let result = EchoTool.execute(json!({"message": "hello"})).await;
        assert_eq!(result.ok(), Some("Echo: hello".to_string()));
    }

    #[tokio::test]
    async fn test_echo_requires_message() {
        let result = EchoTool.execute(json!({})).await;
        assert!(matches!(result, Err(ToolError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_server_status_reports_identity() {
        let tool = ServerStatusTool::new("demo-rs");
        let rendered = tool.execute(json!({})).await.ok();
        let parsed: serde_json::Value =
            serde_json::from_str(rendered.as_deref().unwrap_or_default()).ok().unwrap_or_default();
        assert_eq!(parsed["server"], "demo-rs");
        assert_eq!(parsed["status"], "ok");
    }

    #[test]
    fn test_registry_has_both_tools() {
        let tools = register_tools("demo-rs");
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["echo", "server_status"]);
    }
}
