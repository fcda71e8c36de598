//! Lazy OAuth client orchestration.
//!
//! The client starts with no credentials at all. The first call that needs
//! authentication discovers the authorization server through the resource
//! server's metadata, registers dynamically, runs the browser-based code
//! grant with PKCE, and caches the resulting session. Later calls reuse the
//! session, refresh it when it nears expiry, and fall back to a brand-new
//! flow when refresh fails.
//!
//! All of that hides behind [`AuthClient::ensure_authenticated`], which is
//! safe to call concurrently: one async mutex serializes attempts, so N
//! simultaneous callers produce exactly one browser flow.

pub mod callback;
pub mod discovery;
pub mod rpc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

pub use callback::{CallbackOutcome, CallbackServer};
pub use discovery::{ClientCredentials, DiscoveryClient};
pub use rpc::{RpcClient, ToolSummary};

use crate::config::{ClientConfig, defaults};
use crate::error::{FlowError, FlowResult};
use crate::pkce;

/// An authenticated session with the resource server.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token for MCP requests.
    pub access_token: String,

    /// Refresh token, if the server issued one.
    pub refresh_token: Option<String>,

    /// Access token expiry. `None` means the server gave no lifetime.
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scope string.
    pub scope: Option<String>,

    /// Our registered client id.
    pub client_id: String,
}

impl Session {
    /// Whether the access token is expired or about to expire.
    ///
    /// Applies a 60 second buffer so a token is replaced before it dies
    /// mid-request.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() + Duration::seconds(defaults::TOKEN_REFRESH_BUFFER_SECS) >= expires_at
            }
            None => false,
        }
    }
}

/// Token endpoint success response (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenGrant {
    fn into_session(self, client_id: String) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: self.scope,
            client_id,
        }
    }
}

/// Called with the authorization URL when user interaction is needed.
pub type RedirectHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Credentials and session protected by the single-flight mutex.
#[derive(Default)]
struct AuthSlot {
    session: Option<Session>,
    /// Registration reuse, keyed by the redirect URI it was issued for.
    registration: Option<(String, ClientCredentials)>,
}

/// The lazy MCP client.
pub struct AuthClient {
    config: ClientConfig,
    discovery: DiscoveryClient,
    http: reqwest::Client,
    rpc: RpcClient,
    redirect: RedirectHandler,
    slot: Mutex<AuthSlot>,
}

impl AuthClient {
    /// Create a client that opens the system browser for authorization.
    pub fn new(config: ClientConfig) -> FlowResult<Self> {
        Self::with_redirect_handler(config, Box::new(open_browser))
    }

    /// Create a client with a custom redirect handler. Tests use this to
    /// drive the flow without a browser.
    pub fn with_redirect_handler(
        config: ClientConfig,
        redirect: RedirectHandler,
    ) -> FlowResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(defaults::HTTP_TIMEOUT)
            .build()
            .map_err(FlowError::Transport)?;
        let rpc = RpcClient::new(&config.server_url)?;
        Ok(Self {
            config,
            discovery: DiscoveryClient::new()?,
            http,
            rpc,
            redirect,
            slot: Mutex::new(AuthSlot::default()),
        })
    }

    /// Return a live session, running whatever part of the OAuth machinery
    /// that takes.
    ///
    /// Fast path: a cached unexpired session is returned as-is. Otherwise a
    /// refresh is attempted, and if that is impossible or fails, a full
    /// interactive authorization flow runs. Concurrent callers share one
    /// attempt; a failed flow leaves the client ready to start clean.
    pub async fn ensure_authenticated(&self) -> FlowResult<Session> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.session.as_ref() {
            if !session.is_expired() {
                return Ok(session.clone());
            }
        }

        // Anything past here replaces the session or clears it.
        if let Some(stale) = slot.session.take() {
            if let Some(refresh_token) = stale.refresh_token.as_deref() {
                match self.refresh_session(&stale.client_id, refresh_token).await {
                    Ok(session) => {
                        tracing::debug!("Refreshed access token");
                        slot.session = Some(session.clone());
                        return Ok(session);
                    }
                    Err(error) => {
                        tracing::warn!(
                            %error,
                            "Token refresh failed, starting a new authorization flow"
                        );
                    }
                }
            }
        }

        let session = self.authorization_flow(&mut slot).await?;
        slot.session = Some(session.clone());
        Ok(session)
    }

    /// Drop the cached session. The next call re-authenticates.
    pub async fn handle_unauthorized(&self) {
        let mut slot = self.slot.lock().await;
        if slot.session.take().is_some() {
            tracing::info!("Server rejected our token, discarding session");
        }
    }

    /// Snapshot of the current session, if any.
    pub async fn current_session(&self) -> Option<Session> {
        self.slot.lock().await.session.clone()
    }

    /// List tools, authenticating first and retrying once if the server
    /// rejects our token.
    pub async fn list_tools(&self) -> FlowResult<Vec<ToolSummary>> {
        let session = self.ensure_authenticated().await?;
        match self.rpc.list_tools(&session.access_token).await {
            Err(FlowError::Unauthorized) => {
                self.handle_unauthorized().await;
                let session = self.ensure_authenticated().await?;
                self.rpc.list_tools(&session.access_token).await
            }
            other => other,
        }
    }

    /// Call a tool, authenticating first and retrying once if the server
    /// rejects our token.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> FlowResult<Value> {
        let session = self.ensure_authenticated().await?;
        match self.rpc.call_tool(&session.access_token, name, arguments.clone()).await {
            Err(FlowError::Unauthorized) => {
                self.handle_unauthorized().await;
                let session = self.ensure_authenticated().await?;
                self.rpc.call_tool(&session.access_token, name, arguments).await
            }
            other => other,
        }
    }

    /// The full interactive flow: discovery, listener, browser, exchange.
    ///
    /// The callback listener is bound before the browser is pointed
    /// anywhere and is torn down whatever the outcome.
    async fn authorization_flow(&self, slot: &mut AuthSlot) -> FlowResult<Session> {
        let resource = self.discovery.protected_resource(&self.config.server_url).await?;
        let issuer = resource.authorization_servers.first().ok_or_else(|| {
            FlowError::discovery("resource metadata lists no authorization servers")
        })?;
        let server = self.discovery.authorization_server(issuer).await?;

        let mut listener = CallbackServer::start(self.config.callback_port).await?;
        let result = self.drive_flow(slot, &server, &mut listener).await;
        listener.stop();
        result
    }

    async fn drive_flow(
        &self,
        slot: &mut AuthSlot,
        server: &crate::metadata::AuthorizationServerMetadata,
        listener: &mut CallbackServer,
    ) -> FlowResult<Session> {
        let redirect_uri = listener.redirect_uri();

        let credentials = match slot.registration.as_ref() {
            Some((registered_uri, credentials)) if *registered_uri == redirect_uri => {
                credentials.clone()
            }
            _ => {
                let endpoint = server.registration_endpoint.as_deref().ok_or_else(|| {
                    FlowError::registration(
                        "authorization server does not support dynamic registration",
                    )
                })?;
                let credentials = self
                    .discovery
                    .register(endpoint, &self.config.client_name, &redirect_uri, &self.config.scope)
                    .await?;
                slot.registration = Some((redirect_uri.clone(), credentials.clone()));
                credentials
            }
        };

        // Fresh PKCE pair and state for every attempt.
        let pair = pkce::generate();
        let state = pkce::generate_state();

        let authorize_url = build_authorize_url(
            &server.authorization_endpoint,
            &credentials.client_id,
            &redirect_uri,
            &pair.challenge,
            &state,
            &self.config.scope,
            &self.config.server_url,
        )?;

        (self.redirect)(authorize_url.as_str());

        let outcome = listener.wait_for_result(self.config.flow_timeout).await?;
        let (code, echoed_state) = match outcome {
            CallbackOutcome::Granted { code, state } => (code, state),
            CallbackOutcome::Denied { error, description } => {
                return Err(FlowError::denied(error, description));
            }
        };

        // CSRF check before the code is ever sent to the token endpoint.
        if echoed_state != state {
            return Err(FlowError::CsrfStateMismatch);
        }

        let grant = self
            .exchange_code(
                &server.token_endpoint,
                &credentials,
                &code,
                &pair.verifier,
                &redirect_uri,
            )
            .await?;
        let session = grant.into_session(credentials.client_id);

        self.rpc.initialize(&session.access_token).await?;

        Ok(session)
    }

    async fn exchange_code(
        &self,
        token_endpoint: &str,
        credentials: &ClientCredentials,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> FlowResult<TokenGrant> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", credentials.client_id.as_str()),
            ("code_verifier", verifier),
            ("resource", self.config.server_url.as_str()),
        ];
        if let Some(secret) = credentials.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        self.token_request(token_endpoint, &form).await
    }

    async fn refresh_session(&self, client_id: &str, refresh_token: &str) -> FlowResult<Session> {
        let resource = self.discovery.protected_resource(&self.config.server_url).await?;
        let issuer = resource.authorization_servers.first().ok_or_else(|| {
            FlowError::discovery("resource metadata lists no authorization servers")
        })?;
        let server = self.discovery.authorization_server(issuer).await?;

        let form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        let grant = self.token_request(&server.token_endpoint, &form).await?;
        Ok(grant.into_session(client_id.to_owned()))
    }

    async fn token_request(
        &self,
        token_endpoint: &str,
        form: &[(&str, &str)],
    ) -> FlowResult<TokenGrant> {
        let response = self.http.post(token_endpoint).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::token_exchange(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient").field("config", &self.config).finish_non_exhaustive()
    }
}

fn build_authorize_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    code_challenge: &str,
    state: &str,
    scope: &str,
    resource: &str,
) -> FlowResult<Url> {
    let mut url = Url::parse(authorization_endpoint)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state)
        .append_pair("scope", scope)
        .append_pair("resource", resource);
    Ok(url)
}

/// Default redirect handler: print the URL and try the system browser.
fn open_browser(url: &str) {
    println!("Opening browser for authorization:\n  {url}\n");
    println!("If no browser opens, paste the URL into one manually.");

    let result = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("cmd").args(["/C", "start", "", url]).spawn()
    } else {
        std::process::Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(error) = result {
        tracing::warn!(%error, "Could not launch a browser");
    }
}
