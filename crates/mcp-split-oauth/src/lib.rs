//! Split OAuth 2.0 deployment for MCP
//!
//! Three cooperating processes demonstrate MCP authorization with a
//! standalone authorization server, the topology where the resource server
//! cannot validate tokens locally:
//!
//! - **Authorization server** (`mcp-auth-server`): interactive login,
//!   dynamic client registration, PKCE-only code grant, token introspection
//!   and revocation. All state lives in memory.
//! - **Resource server** (`mcp-resource-server`): serves MCP tools over
//!   JSON-RPC and verifies every bearer token by calling the authorization
//!   server's introspection endpoint. Fails closed.
//! - **Client** (`mcp-client`): starts with no credentials and acquires
//!   them lazily through discovery, registration, and a loopback redirect,
//!   then refreshes or re-authorizes as needed.
//!
//! # Example
//!
//! ```no_run
//! use mcp_split_oauth::{AuthClient, config::ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AuthClient::new(ClientConfig::new("http://localhost:8080"))?;
//!     let tools = client.list_tools().await?;
//!     for tool in tools {
//!         println!("{}: {}", tool.name, tool.description);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pkce;
pub mod resource;

pub use auth::AuthorizationServer;
pub use client::{AuthClient, Session};
pub use error::{AuthError, FlowError, ToolError, VerifyError};
pub use resource::ResourceServer;
