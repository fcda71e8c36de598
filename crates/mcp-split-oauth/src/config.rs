//! Configuration for the authorization server, resource server, and client.

use std::time::Duration;

/// Deployment defaults shared by all three roles.
pub mod defaults {
    use std::time::Duration;

    /// Authorization server port.
    pub const AUTH_SERVER_PORT: u16 = 9000;

    /// Resource server port.
    pub const RESOURCE_SERVER_PORT: u16 = 8080;

    /// Client loopback callback port.
    pub const CALLBACK_PORT: u16 = 3030;

    /// Demo resource-owner username.
    pub const DEMO_USERNAME: &str = "demo_user";

    /// Demo resource-owner password.
    pub const DEMO_PASSWORD: &str = "demo_password";

    /// Scopes the authorization server will grant.
    pub const SUPPORTED_SCOPES: &[&str] = &["user"];

    /// Scope the resource server requires on every token.
    pub const REQUIRED_SCOPE: &str = "user";

    /// Authorization code lifetime: 5 minutes.
    pub const AUTH_CODE_TTL_SECS: i64 = 300;

    /// Pending authorization lifetime: 10 minutes to complete the login form.
    pub const PENDING_AUTH_TTL_SECS: i64 = 600;

    /// Access token lifetime: 1 hour.
    pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

    /// Refresh token lifetime: 30 days.
    pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;

    /// Interval between sweeps of expired grant records.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// Timeout for a single introspection round trip.
    pub const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(10);

    /// How long the client waits for the authorization callback.
    pub const CALLBACK_WAIT: Duration = Duration::from_secs(300);

    /// Timeout for initializing the protected RPC session.
    pub const SESSION_INIT_TIMEOUT: Duration = Duration::from_secs(30);

    /// General HTTP request timeout for client-side calls.
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Refresh the access token this many seconds before it expires.
    pub const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

    /// TTL for cached discovery documents.
    pub const DISCOVERY_CACHE_TTL: Duration = Duration::from_secs(300);

    /// Maximum cached discovery documents.
    pub const DISCOVERY_CACHE_MAX_SIZE: u64 = 16;
}

/// Authorization server configuration.
#[derive(Debug, Clone)]
pub struct AuthServerConfig {
    /// Host to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Issuer URL advertised in the discovery document; all endpoint URLs
    /// are derived from it.
    pub issuer: String,

    /// Demo resource-owner username.
    pub demo_username: String,

    /// Demo resource-owner password.
    pub demo_password: String,

    /// Scopes this server will grant.
    pub supported_scopes: Vec<String>,
}

impl AuthServerConfig {
    /// Create a configuration binding `host:port` with the issuer derived
    /// from them.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            issuer: format!("http://{host}:{port}"),
            host,
            port,
            demo_username: defaults::DEMO_USERNAME.to_string(),
            demo_password: defaults::DEMO_PASSWORD.to_string(),
            supported_scopes: defaults::SUPPORTED_SCOPES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Test configuration with a stable issuer and no real bind address.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new("localhost", defaults::AUTH_SERVER_PORT)
    }

    /// The address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self::new("localhost", defaults::AUTH_SERVER_PORT)
    }
}

/// Resource server configuration.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Host to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Canonical URL of this resource, used for metadata and audience checks.
    pub resource_url: String,

    /// Base URL of the authorization server that protects this resource.
    pub auth_server_url: String,

    /// Scopes every token must carry.
    pub required_scopes: Vec<String>,

    /// Reject tokens whose audience does not cover this resource (RFC 8707).
    pub oauth_strict: bool,

    /// Service name reported in health responses and tool output.
    pub server_name: String,
}

impl ResourceConfig {
    /// Create a configuration binding `host:port`, protected by the given
    /// authorization server.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, auth_server_url: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            resource_url: format!("http://{host}:{port}"),
            host,
            port,
            auth_server_url: auth_server_url.into(),
            required_scopes: vec![defaults::REQUIRED_SCOPE.to_string()],
            oauth_strict: false,
            server_name: "mcp-resource-server".to_string(),
        }
    }

    /// Test configuration pointing at a mock authorization server.
    #[must_use]
    pub fn for_testing(auth_server_url: &str) -> Self {
        Self::new("localhost", defaults::RESOURCE_SERVER_PORT, auth_server_url)
    }

    /// The introspection endpoint derived from the authorization server URL.
    #[must_use]
    pub fn introspection_endpoint(&self) -> String {
        format!("{}/introspect", self.auth_server_url.trim_end_matches('/'))
    }

    /// The address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new("localhost", defaults::RESOURCE_SERVER_PORT, "http://localhost:9000")
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the resource server.
    pub server_url: String,

    /// Loopback port for the authorization callback. Port 0 binds an
    /// ephemeral port (used by tests).
    pub callback_port: u16,

    /// How long to wait for the authorization callback.
    pub flow_timeout: Duration,

    /// Client name sent during dynamic registration.
    pub client_name: String,

    /// Scope requested during authorization.
    pub scope: String,
}

impl ClientConfig {
    /// Create a configuration for the given resource server.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            callback_port: defaults::CALLBACK_PORT,
            flow_timeout: defaults::CALLBACK_WAIT,
            client_name: "mcp-client".to_string(),
            scope: defaults::REQUIRED_SCOPE.to_string(),
        }
    }

    /// Test configuration: ephemeral callback port and a short flow timeout.
    #[must_use]
    pub fn for_testing(server_url: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            callback_port: 0,
            flow_timeout: Duration::from_secs(5),
            client_name: "mcp-client-test".to_string(),
            scope: defaults::REQUIRED_SCOPE.to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(format!("http://localhost:{}", defaults::RESOURCE_SERVER_PORT))
    }
}
