//! Error types for the split OAuth deployment.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Each side of the deployment has its own enum: `AuthError` for the
//! authorization server's protocol decisions, `VerifyError` for the resource
//! server's token checks, and `FlowError` for the client's authorization flow.

use std::time::Duration;

/// Protocol errors raised by the authorization server.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Client registration request was malformed (RFC 7591)
    #[error("Invalid client metadata: {message}")]
    InvalidClientMetadata {
        /// What was wrong with the registration request
        message: String,
    },

    /// The client_id is not registered
    #[error("Unknown client: {client_id}")]
    UnknownClient {
        /// The unrecognized client identifier
        client_id: String,
    },

    /// The redirect URI is not registered for this client
    #[error("Redirect URI not registered: {redirect_uri}")]
    RedirectMismatch {
        /// The rejected redirect URI
        redirect_uri: String,
    },

    /// A requested scope is outside the supported set
    #[error("Unsupported scope: {scope}")]
    UnsupportedScope {
        /// The rejected scope token
        scope: String,
    },

    /// The response_type is not `code`
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The rejected response type
        response_type: String,
    },

    /// The grant_type is neither authorization_code nor refresh_token
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The rejected grant type
        grant_type: String,
    },

    /// Resource-owner login failed
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Code or refresh token is unknown, expired, consumed, or bound to
    /// different parameters (RFC 6749 `invalid_grant`)
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Why the grant was rejected
        message: String,
    },

    /// A required request parameter is missing or malformed
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the malformed parameter
        message: String,
    },

    /// The requested resource indicator was rejected (RFC 8707)
    #[error("Invalid target: {message}")]
    InvalidTarget {
        /// Why the resource indicator was rejected
        message: String,
    },
}

impl AuthError {
    /// Create an invalid client metadata error.
    #[must_use]
    pub fn invalid_client_metadata(message: impl Into<String>) -> Self {
        Self::InvalidClientMetadata { message: message.into() }
    }

    /// Create an unknown client error.
    #[must_use]
    pub fn unknown_client(client_id: impl Into<String>) -> Self {
        Self::UnknownClient { client_id: client_id.into() }
    }

    /// Create a redirect mismatch error.
    #[must_use]
    pub fn redirect_mismatch(redirect_uri: impl Into<String>) -> Self {
        Self::RedirectMismatch { redirect_uri: redirect_uri.into() }
    }

    /// Create an unsupported scope error.
    #[must_use]
    pub fn unsupported_scope(scope: impl Into<String>) -> Self {
        Self::UnsupportedScope { scope: scope.into() }
    }

    /// Create an invalid grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant { message: message.into() }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    /// Create an invalid target error.
    #[must_use]
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget { message: message.into() }
    }

    /// The RFC 6749 / RFC 7591 error code for wire responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidClientMetadata { .. } => "invalid_client_metadata",
            Self::UnknownClient { .. } => "invalid_client",
            Self::RedirectMismatch { .. } | Self::InvalidRequest { .. } => "invalid_request",
            Self::UnsupportedScope { .. } => "invalid_scope",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidCredentials => "access_denied",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidTarget { .. } => "invalid_target",
        }
    }
}

/// Token rejection raised by the resource server.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The bearer token is missing, inactive, or could not be verified.
    ///
    /// Transport failures toward the introspection endpoint land here as
    /// well: an unverifiable token is an invalid token (fail closed).
    #[error("Token rejected: {reason}")]
    Unauthenticated {
        /// Why the token was rejected
        reason: String,
    },

    /// The token is active but lacks a required scope
    #[error("Missing required scope: {required}")]
    InsufficientScope {
        /// The scope this server requires
        required: String,
    },

    /// The token was minted for a different resource
    #[error("Token audience does not cover this resource: {audience}")]
    AudienceMismatch {
        /// The audience the token was actually minted for
        audience: String,
    },
}

impl VerifyError {
    /// Create an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated { reason: reason.into() }
    }

    /// Create an insufficient scope error.
    #[must_use]
    pub fn insufficient_scope(required: impl Into<String>) -> Self {
        Self::InsufficientScope { required: required.into() }
    }

    /// Create an audience mismatch error.
    #[must_use]
    pub fn audience_mismatch(audience: impl Into<String>) -> Self {
        Self::AudienceMismatch { audience: audience.into() }
    }
}

/// Failures in the client-side authorization flow.
#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    /// No callback arrived within the flow timeout
    #[error("Timed out after {0:?} waiting for the authorization callback")]
    Timeout(Duration),

    /// The state returned on the callback does not match the one sent
    #[error("State mismatch on authorization callback")]
    CsrfStateMismatch,

    /// The authorization server redirected back with an error
    #[error("Authorization denied: {error}")]
    AuthorizationDenied {
        /// OAuth error code from the callback
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },

    /// The resource server rejected the session token
    #[error("Resource server rejected the session token")]
    Unauthorized,

    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Middleware error from the retrying discovery client
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Listener socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be parsed or extended
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Metadata discovery failed or the documents were unusable
    #[error("Discovery failed: {message}")]
    Discovery {
        /// What went wrong during discovery
        message: String,
    },

    /// Dynamic client registration was rejected
    #[error("Client registration failed: {message}")]
    Registration {
        /// Registration endpoint response
        message: String,
    },

    /// The token endpoint refused the exchange
    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// An unexpected payload or protocol state
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the unexpected payload or state
        message: String,
    },
}

impl FlowError {
    /// Create a denied error from callback parameters.
    #[must_use]
    pub fn denied(error: impl Into<String>, description: Option<String>) -> Self {
        Self::AuthorizationDenied { error: error.into(), description }
    }

    /// Create a discovery error.
    #[must_use]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery { message: message.into() }
    }

    /// Create a registration error.
    #[must_use]
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration { message: message.into() }
    }

    /// Create a token exchange error.
    #[must_use]
    pub fn token_exchange(status: u16, body: impl Into<String>) -> Self {
        Self::TokenExchange { status, body: body.into() }
    }

    /// Create a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Returns true when a fresh authorization attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unauthorized | Self::Transport(_) | Self::Middleware(_)
        )
    }
}

/// Errors from demo tool execution on the resource server.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal tool logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type alias for authorization server operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for token verification.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Result type alias for client flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Result type alias for tool execution.
pub type ToolResult<T> = Result<T, ToolError>;
