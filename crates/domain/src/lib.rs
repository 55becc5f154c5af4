//! `mb-domain`: configuration and shared error types for masumi-bridge.
//!
//! Kept free of any async or process-management dependencies so that both
//! the MCP client crate and the CLI can depend on it.

pub mod config;
pub mod error;

pub use error::{Error, Result};
