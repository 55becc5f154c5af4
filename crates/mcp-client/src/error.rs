//! Client-level error taxonomy.
//!
//! Every failure a tool call can run into maps onto exactly one
//! [`ErrorKind`], which is what callers branch on. The `Display` text is
//! the human-readable detail.

use serde::Serialize;
use serde_json::Value;

use crate::protocol::describe_error_payload;
use crate::transport::TransportError;

/// Errors specific to MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The server process could not be launched or died inside the
    /// startup grace window.
    #[error("MCP server failed to start: {reason}")]
    Startup {
        reason: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// No valid `initialize` response.
    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    #[error("no reply to '{method}' within {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The process had already exited when a call was about to be written.
    #[error("MCP server process died. Exit code: {exit_code}. Stderr: {stderr}")]
    ProcessDied { exit_code: i32, stderr: String },

    /// The reply line was not JSON.
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// The reply parsed but has neither `result.content[0].text` nor `error`.
    #[error("unexpected response format: {0}")]
    MalformedResponse(String),

    /// The server closed its output without answering.
    #[error("no response from server")]
    ServerUnresponsive,

    /// The server answered with an explicit error payload.
    #[error("tool error: {}", describe_error_payload(.0))]
    Tool(Value),

    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    /// The Session already failed or was stopped; build a new one.
    #[error("MCP session is stopped")]
    SessionStopped,
}

/// Tag identifying the category of a failed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Startup,
    Handshake,
    Timeout,
    ProcessDeath,
    Protocol,
    MalformedResponse,
    ServerUnresponsive,
    Tool,
    Transport,
    SessionStopped,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Handshake => "handshake",
            Self::Timeout => "timeout",
            Self::ProcessDeath => "process_death",
            Self::Protocol => "protocol",
            Self::MalformedResponse => "malformed_response",
            Self::ServerUnresponsive => "server_unresponsive",
            Self::Tool => "tool",
            Self::Transport => "transport",
            Self::SessionStopped => "session_stopped",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl McpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Startup { .. } => ErrorKind::Startup,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ProcessDied { .. } => ErrorKind::ProcessDeath,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ServerUnresponsive => ErrorKind::ServerUnresponsive,
            Self::Tool(_) => ErrorKind::Tool,
            Self::Transport(_) => ErrorKind::Transport,
            Self::SessionStopped => ErrorKind::SessionStopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_per_variant() {
        let errors = [
            McpError::Handshake("x".into()),
            McpError::Timeout {
                method: "tools/call".into(),
                timeout_ms: 5000,
            },
            McpError::ProcessDied {
                exit_code: 1,
                stderr: String::new(),
            },
            McpError::Protocol("x".into()),
            McpError::MalformedResponse("x".into()),
            McpError::ServerUnresponsive,
            McpError::Tool(Value::Null),
            McpError::SessionStopped,
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(McpError::kind).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn tool_error_display_uses_payload() {
        let err = McpError::Tool(serde_json::json!("Agent not found"));
        assert_eq!(err.to_string(), "tool error: Agent not found");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ProcessDeath).unwrap();
        assert_eq!(json, "\"process_death\"");
        assert_eq!(ErrorKind::ProcessDeath.to_string(), "process_death");
    }
}
