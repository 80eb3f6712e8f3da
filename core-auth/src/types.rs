use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reusable access credential for the remote document APIs.
///
/// The serialized form matches the token file on disk: `access_token`,
/// `token_type`, optional `refresh_token`, optional `expiry`. A refreshed or
/// newly issued token always fully replaces the old value; fields are never
/// edited in place.
///
/// # Security
///
/// Token values must never be logged. The `Debug` implementation redacts
/// the secret material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The access token used for API requests
    pub access_token: String,
    /// Token type as reported by the token endpoint, usually `Bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Long-lived refresh token, present when offline access was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC); absent means non-expiring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Create a token expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: default_token_type(),
            refresh_token,
            expiry: Some(Utc::now() + Duration::seconds(expires_in)),
        }
    }

    /// Check whether the access token is expired or expires within the
    /// default 5-minute refresh buffer.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(300)
    }

    /// Check expiry against a custom buffer. A token without an expiry
    /// timestamp is treated as non-expiring.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() >= expiry - Duration::seconds(buffer_seconds),
            None => false,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// State of a single interactive authorization attempt.
///
/// Transient; lives only for the duration of one attempt.
///
/// # Transitions
///
/// ```text
/// NoToken -> AwaitingUserInput ------------> Exchanging -> Authorized | Failed
/// NoToken -> ListeningForCallback -> CodeReceived -> Exchanging -> ...
///                                 \-> Failed | TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthorizationState {
    /// No cached token is available; an attempt is starting
    #[default]
    NoToken,
    /// Manual flow is blocked on operator input
    AwaitingUserInput,
    /// Callback listener is up, waiting for the redirect
    ListeningForCallback,
    /// A callback delivered a valid authorization code
    CodeReceived,
    /// The code is being exchanged at the token endpoint
    Exchanging,
    /// A token was obtained
    Authorized,
    /// The attempt failed; the operator must restart the flow
    Failed,
    /// No callback arrived within the wait bound
    TimedOut,
}

impl AuthorizationState {
    /// Whether this state ends the attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthorizationState::Authorized
                | AuthorizationState::Failed
                | AuthorizationState::TimedOut
        )
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthorizationState::NoToken => "no token",
            AuthorizationState::AwaitingUserInput => "awaiting user input",
            AuthorizationState::ListeningForCallback => "listening for callback",
            AuthorizationState::CodeReceived => "code received",
            AuthorizationState::Exchanging => "exchanging",
            AuthorizationState::Authorized => "authorized",
            AuthorizationState::Failed => "failed",
            AuthorizationState::TimedOut => "timed out",
        };
        write!(f, "{}", name)
    }
}
