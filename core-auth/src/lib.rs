//! # Authorization Module
//!
//! Credential resolution and OAuth 2.0 token lifecycle for the docs connector.
//!
//! ## Overview
//!
//! This crate decides which authentication mode applies (service-account key
//! vs. interactive user consent), keeps a reusable access token alive across
//! process runs, and runs the interactive authorization flow when no usable
//! cached token exists.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization-code flow with PKCE and CSRF state checking
//! - Manual code entry or a short-lived localhost callback listener
//! - Token refresh with bounded retry
//! - File-backed token persistence with owner-only permissions

pub mod callback;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use credentials::{CredentialMode, CredentialSource, ServiceAccountKey};
pub use error::{AuthError, Result};
pub use flow::InteractiveFlow;
pub use oauth::{AttemptSecret, ClientConfig, OAuthConfig, OAuthFlowManager};
pub use token_store::TokenStore;
pub use types::{AuthorizationState, Token};
