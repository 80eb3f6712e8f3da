//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the docs connector core:
//! - Environment-driven configuration
//! - Logging and tracing infrastructure
//! - Runtime-level error type
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other members depend on.
//! It establishes the configuration conventions (which environment variables
//! select the credential sources, token location, and callback listener) and
//! the logging setup used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Settings;
pub use error::{Error, Result};
