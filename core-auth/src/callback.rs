//! Short-lived localhost listener for the OAuth redirect.
//!
//! The listener binds `127.0.0.1:<port>`, serves a single route
//! (`/oauth/callback`), and delivers exactly one outcome to the foreground
//! flow through one-shot channels: a valid authorization code, or an error
//! (state mismatch, missing code). The foreground races that outcome against
//! a timeout; whichever resolves first, the listener is shut down once with
//! a bounded grace period.
//!
//! Nothing is thrown across the task boundary; the handler signals outcomes
//! through the channels and otherwise only answers the browser.

use crate::error::{AuthError, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// The single route the listener answers.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Grace period for tearing the listener down after the race resolves.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const SUCCESS_HTML: &str = "\
<!DOCTYPE html>
<html>
<head><title>Authorization Successful</title></head>
<body>
  <h1>Authorization successful</h1>
  <p>You can close this window and return to your terminal.</p>
</body>
</html>";

/// A bound, not-yet-serving callback listener.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Bind the loopback listener on the given port (0 picks a free one).
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| AuthError::Callback(format!("failed to bind 127.0.0.1:{}: {}", port, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Callback(format!("failed to read local address: {}", e)))?
            .port();

        debug!(port = port, "Callback listener bound");

        Ok(Self { listener, port })
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The redirect target to advertise in the authorization URL.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    /// Start serving on a background task, bound to one attempt's state.
    pub fn serve(self, expected_state: String) -> ServingListener {
        let (code_tx, code_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(accept_loop(
            self.listener,
            expected_state,
            code_tx,
            error_tx,
            shutdown.clone(),
        ));

        ServingListener {
            code_rx,
            error_rx,
            shutdown,
            task,
        }
    }
}

/// Handle to a serving listener; resolves one outcome then shuts down.
pub struct ServingListener {
    code_rx: oneshot::Receiver<String>,
    error_rx: oneshot::Receiver<AuthError>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServingListener {
    /// Wait for the first of: delivered code, delivered error, timeout.
    ///
    /// The three events race with no priority beyond arrival order; the
    /// losers are discarded. The listener is torn down exactly once before
    /// this returns, bounded by the shutdown grace period even if no
    /// request ever arrived.
    pub async fn wait(mut self, wait_bound: Duration) -> Result<String> {
        let outcome = tokio::select! {
            code = &mut self.code_rx => match code {
                Ok(code) => Ok(code),
                Err(_) => Err(AuthError::Callback("listener stopped unexpectedly".to_string())),
            },
            error = &mut self.error_rx => match error {
                Ok(error) => Err(error),
                Err(_) => Err(AuthError::Callback("listener stopped unexpectedly".to_string())),
            },
            _ = tokio::time::sleep(wait_bound) => Err(AuthError::Timeout),
        };

        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.task).await.is_err() {
            warn!("Callback listener did not stop within the grace period");
        }

        outcome
    }
}

async fn accept_loop(
    listener: TcpListener,
    expected_state: String,
    code_tx: oneshot::Sender<String>,
    error_tx: oneshot::Sender<AuthError>,
    shutdown: CancellationToken,
) {
    let mut code_tx = Some(code_tx);
    let mut error_tx = Some(error_tx);

    loop {
        let (socket, peer) = tokio::select! {
            _ = shutdown.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    if let Some(tx) = error_tx.take() {
                        let _ = tx.send(AuthError::Callback(format!("accept failed: {}", e)));
                    }
                    return;
                }
            },
        };

        debug!(peer = %peer, "Callback request received");

        match handle_connection(socket, &expected_state).await {
            ConnectionOutcome::Code(code) => {
                if let Some(tx) = code_tx.take() {
                    let _ = tx.send(code);
                }
                return;
            }
            ConnectionOutcome::Error(error) => {
                if let Some(tx) = error_tx.take() {
                    let _ = tx.send(error);
                }
                return;
            }
            // Unrelated requests (wrong path, unreadable) keep the attempt
            // alive; the redirect may still arrive.
            ConnectionOutcome::Ignored => continue,
        }
    }
}

enum ConnectionOutcome {
    Code(String),
    Error(AuthError),
    Ignored,
}

async fn handle_connection(mut socket: TcpStream, expected_state: &str) -> ConnectionOutcome {
    let mut buffer = vec![0u8; 8192];
    let size = match socket.read(&mut buffer).await {
        Ok(0) | Err(_) => return ConnectionOutcome::Ignored,
        Ok(size) => size,
    };

    let request = String::from_utf8_lossy(&buffer[..size]);
    let Some(target) = extract_request_target(&request) else {
        respond(&mut socket, "400 Bad Request", "").await;
        return ConnectionOutcome::Ignored;
    };

    let Some(callback) = parse_callback_target(&target) else {
        respond(&mut socket, "404 Not Found", "").await;
        return ConnectionOutcome::Ignored;
    };

    // Exact string match; any difference is a forgery signal.
    if callback.state.as_deref() != Some(expected_state) {
        warn!("Callback carried a mismatched state parameter");
        respond(&mut socket, "400 Bad Request", "").await;
        return ConnectionOutcome::Error(AuthError::StateMismatch {
            expected: expected_state.to_string(),
            actual: callback.state.unwrap_or_default(),
        });
    }

    let Some(code) = callback.code.filter(|c| !c.is_empty()) else {
        warn!("Callback matched the state but carried no authorization code");
        respond(&mut socket, "400 Bad Request", "").await;
        return ConnectionOutcome::Error(AuthError::Callback(
            "authorization code not found in callback".to_string(),
        ));
    };

    info!("Authorization code delivered via callback");
    respond(&mut socket, "200 OK", SUCCESS_HTML).await;
    ConnectionOutcome::Code(code)
}

fn extract_request_target(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }
    Some(target.to_string())
}

struct CallbackRequest {
    state: Option<String>,
    code: Option<String>,
}

fn parse_callback_target(target: &str) -> Option<CallbackRequest> {
    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut state = None;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.to_string()),
            "code" => code = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackRequest { state, code })
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
