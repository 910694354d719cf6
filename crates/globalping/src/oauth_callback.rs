use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

pub(crate) const CALLBACK_PATH: &str = "/callback";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

const SUCCESS_PAGE: &str =
    "<!doctype html><p>Success! You are now authenticated. You can close this tab.</p>";
const FAILURE_PAGE: &str = "<!doctype html><p>Authentication failed. Return to the terminal for details.</p>";

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    expected_state: String,
    result: Mutex<Option<oneshot::Sender<Result<String, String>>>>,
}

/// Loopback listener that receives the authorization redirect.
pub(crate) struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    pub(crate) async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind the login callback listener")?;
        let addr = listener
            .local_addr()
            .context("failed to resolve the login callback address")?;
        Ok(Self { listener, addr })
    }

    pub(crate) fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.addr.port())
    }

    /// Serves until a redirect carrying `expected_state` arrives.
    ///
    /// Requests with another state are answered with 400 and ignored.
    pub(crate) async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Result<String> {
        let (result_tx, result_rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            expected_state: expected_state.to_string(),
            result: Mutex::new(Some(result_tx)),
        });
        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, result_rx).await;
        let _ = shutdown_tx.send(());
        // Browsers keep the connection alive, which holds graceful shutdown open.
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(error))) => debug!(%error, "login callback server failed"),
            Ok(Err(error)) => debug!(%error, "login callback server task ended abnormally"),
            Err(_) => server.abort(),
        }
        match outcome {
            Err(_) => bail!("timed out waiting for the browser login to complete"),
            Ok(Err(_)) => bail!("login callback server stopped before a code arrived"),
            Ok(Ok(result)) => result.map_err(|reason| anyhow!("authorization failed: {reason}")),
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    if query.state.as_deref() != Some(state.expected_state.as_str()) {
        return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response();
    }
    let (status, page, result) = match (query.code, query.error) {
        (_, Some(error)) => {
            let reason = match query.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            (StatusCode::BAD_REQUEST, FAILURE_PAGE, Err(reason))
        }
        (Some(code), None) if !code.trim().is_empty() => (StatusCode::OK, SUCCESS_PAGE, Ok(code)),
        _ => return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response(),
    };
    if let Some(sender) = state.result.lock().await.take() {
        let _ = sender.send(result);
    }
    (status, Html(page)).into_response()
}
