//! # Configuration Module
//!
//! Environment-driven settings for the docs connector core.
//!
//! ## Overview
//!
//! All runtime knobs come from environment variables, matching the deployment
//! conventions of the surrounding system:
//!
//! - `GOOGLE_APPLICATION_CREDENTIALS`: path to a service-account key file
//! - `GOOGLE_CLIENT_SECRETS`: path to an OAuth client secrets file
//! - `GOOGLE_TOKEN_PATH`: token cache location (default `token.json`)
//! - `OAUTH_USE_CALLBACK`: `true`/`1` selects the callback-server flow
//! - `OAUTH_CALLBACK_PORT`: local callback listener port (default 8080)
//!
//! Settings are captured once at startup and are immutable afterwards.
//! Validation is limited to well-formedness (e.g. a parseable port); whether
//! the configured credential files exist or are usable is decided downstream.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Default token cache file, relative to the working directory.
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Default port for the local OAuth callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// Immutable runtime settings.
///
/// Construct with [`Settings::from_env`] at startup, or with
/// [`SettingsBuilder`] in tests.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to a service-account key file, if configured.
    pub service_account_path: Option<String>,

    /// Path to an OAuth client secrets file, if configured.
    pub client_secrets_path: Option<String>,

    /// Location of the cached token file.
    pub token_path: PathBuf,

    /// Whether interactive authorization uses the local callback server
    /// instead of manual code entry.
    pub use_callback: bool,

    /// Port the callback listener binds on.
    pub callback_port: u16,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// Unset or empty variables fall back to their defaults. An unparseable
    /// `OAUTH_CALLBACK_PORT` is a configuration error.
    pub fn from_env() -> Result<Self> {
        let mut builder = SettingsBuilder::default();

        if let Some(path) = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS") {
            builder = builder.service_account_path(path);
        }
        if let Some(path) = non_empty_var("GOOGLE_CLIENT_SECRETS") {
            builder = builder.client_secrets_path(path);
        }
        if let Some(path) = non_empty_var("GOOGLE_TOKEN_PATH") {
            builder = builder.token_path(path);
        }
        if let Some(flag) = non_empty_var("OAUTH_USE_CALLBACK") {
            builder = builder.use_callback(matches!(flag.as_str(), "true" | "1"));
        }
        if let Some(port) = non_empty_var("OAUTH_CALLBACK_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                Error::Config(format!("Invalid OAUTH_CALLBACK_PORT '{}': {}", port, e))
            })?;
            builder = builder.callback_port(port);
        }

        Ok(builder.build())
    }

    /// Start building settings explicitly.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    service_account_path: Option<String>,
    client_secrets_path: Option<String>,
    token_path: Option<PathBuf>,
    use_callback: Option<bool>,
    callback_port: Option<u16>,
}

impl SettingsBuilder {
    pub fn service_account_path(mut self, path: impl Into<String>) -> Self {
        self.service_account_path = Some(path.into());
        self
    }

    pub fn client_secrets_path(mut self, path: impl Into<String>) -> Self {
        self.client_secrets_path = Some(path.into());
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn use_callback(mut self, enabled: bool) -> Self {
        self.use_callback = Some(enabled);
        self
    }

    pub fn callback_port(mut self, port: u16) -> Self {
        self.callback_port = Some(port);
        self
    }

    pub fn build(self) -> Settings {
        Settings {
            service_account_path: self.service_account_path,
            client_secrets_path: self.client_secrets_path,
            token_path: self
                .token_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            use_callback: self.use_callback.unwrap_or(false),
            callback_port: self.callback_port.unwrap_or(DEFAULT_CALLBACK_PORT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let settings = Settings::builder().build();
        assert!(settings.service_account_path.is_none());
        assert!(settings.client_secrets_path.is_none());
        assert_eq!(settings.token_path, PathBuf::from(DEFAULT_TOKEN_PATH));
        assert!(!settings.use_callback);
        assert_eq!(settings.callback_port, DEFAULT_CALLBACK_PORT);
    }

    #[test]
    fn builder_overrides_everything() {
        let settings = Settings::builder()
            .service_account_path("/creds/sa.json")
            .client_secrets_path("/creds/client.json")
            .token_path("/state/token.json")
            .use_callback(true)
            .callback_port(9090)
            .build();

        assert_eq!(settings.service_account_path.as_deref(), Some("/creds/sa.json"));
        assert_eq!(settings.client_secrets_path.as_deref(), Some("/creds/client.json"));
        assert_eq!(settings.token_path, PathBuf::from("/state/token.json"));
        assert!(settings.use_callback);
        assert_eq!(settings.callback_port, 9090);
    }
}
