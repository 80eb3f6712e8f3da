use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No usable cached token: {0}")]
    TokenNotFound(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("State mismatch: expected '{expected}', got '{actual}'")]
    StateMismatch { expected: String, actual: String },

    #[error("Callback error: {0}")]
    Callback(String),

    #[error("Invalid authorization code: {0}")]
    InvalidCode(String),

    #[error("Authorization timed out waiting for the callback")]
    Timeout,

    #[error("Failed to persist token: {0}")]
    Persistence(String),

    #[error("Authorization cancelled by operator")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AuthError>;
