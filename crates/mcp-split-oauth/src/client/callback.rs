//! Loopback HTTP listener for the authorization redirect.
//!
//! Binds before the browser is sent anywhere, hands the redirect's outcome
//! to the waiting flow through a single-slot oneshot channel, and shows the
//! user a terminal page. A second hit on the callback cannot overwrite the
//! first outcome.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};

use crate::error::{FlowError, FlowResult};

/// What the authorization server sent back through the browser.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// The user approved: an authorization code and the echoed state.
    Granted { code: String, state: String },
    /// The server reported an error, or the redirect was malformed.
    Denied { error: String, description: Option<String> },
}

struct ListenerState {
    slot: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

/// A running callback listener. One authorization attempt per instance.
pub struct CallbackServer {
    addr: SocketAddr,
    result: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:port` and start serving. Port 0 picks a free port.
    ///
    /// The listener is live when this returns, so the redirect URI can be
    /// handed out immediately without racing the browser.
    pub async fn start(port: u16) -> FlowResult<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ListenerState { slot: Mutex::new(Some(result_tx)) });
        let router = Router::new()
            .route("/callback", get(capture))
            .fallback(not_found)
            .with_state(state);

        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(%error, "Callback listener exited with error");
            }
        });

        tracing::debug!(%addr, "Callback listener started");

        Ok(Self { addr, result: Some(result_rx), shutdown: Some(shutdown_tx) })
    }

    /// The bound port. Differs from the requested port only when that was 0.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The redirect URI to register and send in the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.addr.port())
    }

    /// Wait for the redirect to arrive, up to `timeout`.
    ///
    /// Consumes the single result slot; a second call reports the outcome
    /// as already taken.
    pub async fn wait_for_result(&mut self, timeout: Duration) -> FlowResult<CallbackOutcome> {
        let Some(receiver) = self.result.take() else {
            return Err(FlowError::protocol("callback result already consumed"));
        };
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => {
                Err(FlowError::protocol("callback listener stopped before a redirect arrived"))
            }
            Err(_) => Err(FlowError::Timeout(timeout)),
        }
    }

    /// Shut the listener down. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::debug!(addr = %self.addr, "Callback listener stopped");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn capture(
    State(state): State<Arc<ListenerState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(sender) = state.slot.lock().await.take() else {
        // A redirect already landed; keep its outcome.
        return Html(ALREADY_HANDLED_PAGE).into_response();
    };

    let (outcome, page) = match (query.error, query.code, query.state) {
        (Some(error), _, _) => {
            let outcome =
                CallbackOutcome::Denied { error, description: query.error_description };
            (outcome, FAILURE_PAGE)
        }
        (None, Some(code), Some(echoed_state)) => {
            (CallbackOutcome::Granted { code, state: echoed_state }, SUCCESS_PAGE)
        }
        _ => {
            let outcome = CallbackOutcome::Denied {
                error: "invalid_request".to_string(),
                description: Some("redirect carried neither a code nor an error".to_string()),
            };
            (outcome, FAILURE_PAGE)
        }
    };

    // The receiver may have timed out and gone away.
    let _ = sender.send(outcome);
    Html(page).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

const SUCCESS_PAGE: &str = r"<!DOCTYPE html>
<html lang='en'>
<head><meta charset='utf-8'><title>Authorization Complete</title>
<style>body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; display: flex; justify-content: center; align-items: center; min-height: 100vh; margin: 0; } .card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; text-align: center; } h1 { font-size: 20px; color: #2a7a2a; margin: 0 0 8px; } p { color: #666; font-size: 14px; }</style>
</head>
<body><div class='card'><h1>Authorization successful</h1><p>You can close this window and return to the client.</p></div></body>
</html>";

const FAILURE_PAGE: &str = r"<!DOCTYPE html>
<html lang='en'>
<head><meta charset='utf-8'><title>Authorization Failed</title>
<style>body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; display: flex; justify-content: center; align-items: center; min-height: 100vh; margin: 0; } .card { background: #fff; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); padding: 32px; text-align: center; } h1 { font-size: 20px; color: #c00; margin: 0 0 8px; } p { color: #666; font-size: 14px; }</style>
</head>
<body><div class='card'><h1>Authorization failed</h1><p>You can close this window. Check the client for details.</p></div></body>
</html>";

const ALREADY_HANDLED_PAGE: &str = r"<!DOCTYPE html>
<html lang='en'>
<head><meta charset='utf-8'><title>Authorization Complete</title></head>
<body><p>This authorization attempt was already completed. You can close this window.</p></body>
</html>";
