//! Interactive authorization flow.
//!
//! Produces a fresh token when no usable cached token exists. Two variants,
//! selected by configuration at flow start, implement the same
//! `authorize -> Token | Error` contract:
//!
//! - **Manual code**: print the authorization URL, block on one line of
//!   interactive input, exchange the entered code.
//! - **Callback server**: start a short-lived localhost listener, race the
//!   redirect against a timeout, exchange the captured code.
//!
//! Whichever branch completes, the fresh token is persisted via the token
//! store before it is handed to the caller. All flow errors are terminal for
//! the attempt; nothing is retried internally.

use crate::callback::CallbackListener;
use crate::error::{AuthError, Result};
use crate::oauth::{AttemptSecret, ClientConfig, OAuthFlowManager, MANUAL_REDIRECT_URI};
use crate::token_store::TokenStore;
use crate::types::{AuthorizationState, Token};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// How long the callback race waits for the redirect.
pub const CALLBACK_WAIT: Duration = Duration::from_secs(300);

/// Strategy for obtaining a fresh token interactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveFlow {
    /// Print the URL and read the authorization code from the operator.
    ManualCode,
    /// Capture the authorization code via a localhost redirect.
    CallbackServer { port: u16 },
}

impl InteractiveFlow {
    /// Select the variant from configuration.
    pub fn from_settings(use_callback: bool, callback_port: u16) -> Self {
        if use_callback {
            InteractiveFlow::CallbackServer {
                port: callback_port,
            }
        } else {
            InteractiveFlow::ManualCode
        }
    }

    /// Run one authorization attempt and persist the obtained token.
    pub async fn authorize(
        &self,
        client: ClientConfig,
        scopes: &[String],
        store: &TokenStore,
    ) -> Result<Token> {
        match self {
            InteractiveFlow::ManualCode => {
                let manager = OAuthFlowManager::new(
                    client.into_oauth_config(MANUAL_REDIRECT_URI, scopes.to_vec()),
                );
                let input = BufReader::new(tokio::io::stdin());
                manual_authorize(&manager, input, store).await
            }
            InteractiveFlow::CallbackServer { port } => {
                let listener = CallbackListener::bind(*port).await?;
                let secret = AttemptSecret::generate();
                callback_authorize(listener, client, scopes, store, CALLBACK_WAIT, secret).await
            }
        }
    }
}

fn advance(state: &mut AuthorizationState, next: AuthorizationState) {
    debug!(from = %state, to = %next, "Authorization state transition");
    *state = next;
}

// Line-buffered stdout would hold the prompt back until after the operator
// types; flush before blocking on input.
fn prompt(text: &str) {
    use std::io::Write;
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

async fn manual_authorize<R>(
    manager: &OAuthFlowManager,
    mut input: R,
    store: &TokenStore,
) -> Result<Token>
where
    R: AsyncBufRead + Unpin,
{
    let mut state = AuthorizationState::NoToken;
    let secret = AttemptSecret::for_manual_flow();
    let auth_url = manager.build_auth_url(&secret)?;

    println!("Authorize this app by visiting this URL:");
    println!();
    println!("  {}", auth_url);
    println!();
    println!("After granting access, copy the authorization code from the");
    println!("redirect URL (the value after 'code=') and paste it here.");
    println!();
    prompt("Enter the code: ");

    advance(&mut state, AuthorizationState::AwaitingUserInput);

    let code = read_trimmed_line(&mut input).await?;
    if code.is_empty() {
        advance(&mut state, AuthorizationState::Failed);
        return Err(AuthError::InvalidCode(
            "authorization code cannot be empty".to_string(),
        ));
    }

    // Soft format check only; codes from this provider conventionally
    // start with "4/".
    if !code.starts_with("4/") {
        println!("Warning: the code does not look like a typical authorization code.");
        prompt("Continue anyway? (y/N): ");

        let confirm = read_trimmed_line(&mut input).await?;
        if !confirm.eq_ignore_ascii_case("y") {
            advance(&mut state, AuthorizationState::Failed);
            warn!("Operator declined to proceed with an unusual-looking code");
            return Err(AuthError::Cancelled);
        }
    }

    advance(&mut state, AuthorizationState::Exchanging);
    let token = match manager.exchange_code(&code, secret.state(), &secret).await {
        Ok(token) => token,
        Err(e) => {
            advance(&mut state, AuthorizationState::Failed);
            return Err(e);
        }
    };

    store.save(&token).await?;
    advance(&mut state, AuthorizationState::Authorized);
    info!("Manual authorization completed");

    Ok(token)
}

async fn callback_authorize(
    listener: CallbackListener,
    client: ClientConfig,
    scopes: &[String],
    store: &TokenStore,
    wait_bound: Duration,
    secret: AttemptSecret,
) -> Result<Token> {
    let mut state = AuthorizationState::NoToken;

    let manager = OAuthFlowManager::new(
        client.into_oauth_config(listener.redirect_uri(), scopes.to_vec()),
    );
    let auth_url = manager.build_auth_url(&secret)?;

    let serving = listener.serve(secret.state().to_string());
    advance(&mut state, AuthorizationState::ListeningForCallback);

    println!("Visit this URL to authorize the application:");
    println!();
    println!("  {}", auth_url);
    println!();
    println!("Waiting for the browser redirect to complete the authorization...");

    let code = match serving.wait(wait_bound).await {
        Ok(code) => code,
        Err(AuthError::Timeout) => {
            advance(&mut state, AuthorizationState::TimedOut);
            warn!("No callback arrived within the wait bound; try the flow again");
            return Err(AuthError::Timeout);
        }
        Err(e) => {
            advance(&mut state, AuthorizationState::Failed);
            warn!("Callback delivered an error; check the client configuration");
            return Err(e);
        }
    };
    advance(&mut state, AuthorizationState::CodeReceived);

    advance(&mut state, AuthorizationState::Exchanging);
    let token = match manager.exchange_code(&code, secret.state(), &secret).await {
        Ok(token) => token,
        Err(e) => {
            advance(&mut state, AuthorizationState::Failed);
            return Err(e);
        }
    };

    store.save(&token).await?;
    advance(&mut state, AuthorizationState::Authorized);
    info!("Callback authorization completed");

    Ok(token)
}

async fn read_trimmed_line<R>(input: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .map_err(|e| AuthError::InvalidCode(format!("unable to read input: {}", e)))?;
    Ok(line.trim().to_string())
}
