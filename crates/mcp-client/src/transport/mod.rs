//! MCP transport layer.
//!
//! A transport owns the byte-level channel to one tool server. Two
//! implementations exist:
//! - **Stdio**: spawn a child process, exchange newline-delimited JSON over
//!   its stdin/stdout, collect stderr for diagnostics.
//! - **Memory**: an in-process stub driven by a responder closure, used to
//!   exercise the channel and invoker without spawning anything.
//!
//! Transports only move lines and report process state. Reply correlation
//! and per-request deadlines live in [`crate::channel`].

pub mod memory;
pub mod stdio;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::{MemoryHandle, MemoryTransport};
pub use stdio::{LaunchSpec, StdioTransport};

/// Outcome of a bounded line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// One complete line, without its trailing newline.
    Line(String),
    /// Nothing arrived before the deadline. A line that arrives later stays
    /// buffered for the next read.
    TimedOut,
    /// The server closed its output.
    Closed,
}

/// Liveness of the process behind a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exited with the given code (negative signal number when killed by a
    /// signal on unix).
    Exited(i32),
}

/// Capability interface over the server connection.
#[async_trait]
pub trait Transport: Send {
    /// Write one line (a newline is appended) and flush.
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Wait up to `timeout` for one line.
    async fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError>;

    /// Non-blocking liveness probe.
    fn status(&mut self) -> ProcessStatus;

    fn is_alive(&mut self) -> bool {
        self.status() == ProcessStatus::Running
    }

    /// Everything the server wrote to its diagnostic stream so far. Waits
    /// briefly for the stream to close when the process has exited.
    async fn drain_diagnostics(&mut self) -> String;

    /// Stop the server and release it. Idempotent.
    async fn terminate(&mut self);
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server died immediately. Exit code: {exit_code}. Stderr: {stderr}")]
    ExitedDuringStartup { exit_code: i32, stderr: String },

    #[error("MCP server process has exited")]
    ProcessExited,

    #[error("MCP server stdin is closed")]
    PipeClosed,
}
