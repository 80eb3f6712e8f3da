//! OAuth 2.0 authorization-code flow manager.
//!
//! Handles the pieces of RFC 6749 (plus the PKCE extension of RFC 7636) the
//! connector needs:
//! - Parsing the OAuth client secrets file
//! - Building authorization URLs with per-attempt state and PKCE challenge
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens
//!
//! # Security
//!
//! - The state parameter is compared with exact string matching before any
//!   exchange; a mismatch aborts the attempt without a network call.
//! - State values and PKCE verifiers are generated per attempt and used once.
//! - Token values, codes, and verifiers are never logged.

use crate::error::{AuthError, Result};
use crate::types::Token;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Fixed anti-forgery marker used by the manual-code flow.
pub const MANUAL_FLOW_STATE: &str = "state-token";

/// Redirect target the manual-code flow advertises.
pub const MANUAL_REDIRECT_URI: &str = "http://localhost";

/// Timeout applied to every token-endpoint request.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const REFRESH_MAX_RETRIES: u32 = 3;

/// OAuth client registration, as read from the client secrets file.
///
/// Google client secrets wrap the registration under either an `installed`
/// or `web` key; both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

impl ClientConfig {
    /// Parse a client secrets JSON document.
    pub fn from_json(data: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(data)
            .map_err(|e| AuthError::Configuration(format!("malformed client secrets: {}", e)))?;

        let config = file.installed.or(file.web).ok_or_else(|| {
            AuthError::Configuration(
                "client secrets file has neither an 'installed' nor a 'web' section".to_string(),
            )
        })?;

        if config.client_id.is_empty() {
            return Err(AuthError::Configuration(
                "client secrets file carries an empty client_id".to_string(),
            ));
        }

        Ok(config)
    }

    /// Bind this registration to a redirect target and scope set.
    pub fn into_oauth_config(
        self,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: redirect_uri.into(),
            scopes,
            auth_url: self.auth_uri,
            token_url: self.token_uri,
        }
    }
}

/// Fully bound OAuth 2.0 configuration for one flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Redirect URI for the authorization response
    pub redirect_uri: String,
    /// List of OAuth scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

/// Per-attempt secret material: anti-forgery state plus PKCE verifier.
///
/// Generated once per authorization attempt and never reused. The verifier
/// stays local; only the derived challenge is sent during authorization.
#[derive(Clone)]
pub struct AttemptSecret {
    state: String,
    verifier: String,
}

impl AttemptSecret {
    /// Generate fresh random state and verifier values.
    ///
    /// The state is 16 random bytes and the verifier 32 random bytes, both
    /// URL-safe base64 without padding (43-128 verifier characters per
    /// RFC 7636).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);

        Self {
            state: URL_SAFE_NO_PAD.encode(state_bytes),
            verifier: URL_SAFE_NO_PAD.encode(verifier_bytes),
        }
    }

    /// Generate a verifier under the fixed manual-flow state marker.
    pub fn for_manual_flow() -> Self {
        Self {
            state: MANUAL_FLOW_STATE.to_string(),
            ..Self::generate()
        }
    }

    /// The state parameter for this attempt.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The PKCE code verifier.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The S256 code challenge: BASE64URL(SHA256(verifier)).
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl std::fmt::Debug for AttemptSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptSecret")
            .field("state", &self.state)
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Drives authorization-URL construction and token-endpoint calls.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthFlowManager {
    /// Create a flow manager with a default HTTP client.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a flow manager over an existing HTTP client.
    pub fn with_client(config: OAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// The bound configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL for an attempt.
    ///
    /// Embeds the client id, redirect target, scopes, the attempt's state,
    /// the PKCE challenge, and `access_type=offline` so a refresh token is
    /// obtainable.
    pub fn build_auth_url(&self, secret: &AttemptSecret) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Configuration(format!("invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", secret.state());
            query.append_pair("code_challenge", &secret.challenge());
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
        }

        debug!("Built authorization URL");

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token.
    ///
    /// The delivered state is checked against the attempt's state first;
    /// a mismatch aborts without any network activity. Exchange failures
    /// are fatal to the attempt and never retried internally.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        secret: &AttemptSecret,
    ) -> Result<Token> {
        if state != secret.state() {
            warn!("Authorization state mismatch, refusing to exchange code");
            return Err(AuthError::StateMismatch {
                expected: secret.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &self.config.redirect_uri);
        params.insert("client_id", &self.config.client_id);
        params.insert("code_verifier", secret.verifier());
        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret);
        }

        debug!("Exchanging authorization code for token");

        let response = self
            .post_token_endpoint(&params)
            .await
            .map_err(|e| AuthError::Exchange(format!("token endpoint request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error response".to_string());

            warn!(status = %status, "Token exchange rejected by the endpoint");

            return Err(AuthError::Exchange(format!(
                "token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("unparseable token response: {}", e)))?;

        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for token"
        );

        Ok(token_response.into_token(None))
    }

    /// Refresh an access token using its refresh value.
    ///
    /// 4xx responses fail immediately (the refresh token is invalid or
    /// revoked); 5xx responses are retried with exponential backoff up to
    /// three attempts. When the endpoint does not rotate the refresh token,
    /// the previous one is carried forward.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_value: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_value);
        params.insert("client_id", &self.config.client_id);
        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret);
        }

        debug!("Refreshing access token");

        let mut attempts = 0;
        loop {
            attempts += 1;

            let response = self
                .post_token_endpoint(&params)
                .await
                .map_err(|e| AuthError::Refresh(format!("token endpoint request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                let token_response: TokenResponse = response.json().await.map_err(|e| {
                    AuthError::Refresh(format!("unparseable token response: {}", e))
                })?;

                info!(
                    expires_in = token_response.expires_in,
                    "Refreshed access token"
                );

                return Ok(token_response.into_token(Some(refresh_value.to_string())));
            }

            if status.is_client_error() {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unable to read error response".to_string());

                warn!(status = %status, "Token refresh rejected without retry");

                return Err(AuthError::Refresh(format!(
                    "token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= REFRESH_MAX_RETRIES {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unable to read error response".to_string());

                return Err(AuthError::Refresh(format!(
                    "token refresh failed after {} attempts, last error {}: {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status = %status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn post_token_endpoint(
        &self,
        params: &HashMap<&str, &str>,
    ) -> std::result::Result<reqwest::Response, String> {
        let body = serde_urlencoded::to_string(params)
            .map_err(|e| format!("failed to encode token request: {}", e))?;

        self.http
            .post(&self.config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())
    }
}

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> Token {
        let mut token = Token::new(
            self.access_token,
            self.refresh_token.or(previous_refresh),
            self.expires_in,
        );
        if let Some(token_type) = self.token_type {
            token.token_type = token_type;
        }
        token
    }
}
