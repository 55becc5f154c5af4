//! `mb-mcp-client`: MCP (Model Context Protocol) tool client for the
//! Masumi agent network.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for talking to an MCP server.
//! - A [`Transport`] abstraction with a stdio implementation that spawns the
//!   server as a child process, and an in-memory one for tests.
//! - A [`Session`] that starts the server, runs the handshake once and owns
//!   the connection until it is stopped.
//! - A [`ToolInvoker`] with one wrapper per Masumi tool, returning a tagged
//!   [`ToolResult`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use mb_mcp_client::ToolInvoker;
//!
//! let config = mb_domain::config::Config::load("masumi.toml".as_ref())?;
//! let mut invoker = ToolInvoker::from_config(&config);
//!
//! match invoker.query_registry("Preprod").await {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{}: {e}", e.kind()),
//! }
//! invoker.stop().await;
//! ```

pub mod channel;
pub mod config;
pub mod env;
pub mod error;
pub mod handshake;
pub mod invoker;
pub mod legacy;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience.
pub use channel::RequestChannel;
pub use config::{ClientConfig, Config, ServerConfig};
pub use error::{ErrorKind, McpError};
pub use invoker::{AgentRegistration, ToolInvoker, ToolResult};
pub use legacy::{is_legacy_error, render_legacy};
pub use session::{Session, SessionOptions, SessionState};
pub use transport::{
    LaunchSpec, MemoryHandle, MemoryTransport, StdioTransport, Transport, TransportError,
};
