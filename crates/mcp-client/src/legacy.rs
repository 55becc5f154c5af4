//! Historical text rendering of tool results.
//!
//! Older callers expect one string per call, with failures spelled as
//! `❌`-prefixed messages and detected by substring. New code should branch
//! on [`McpError::kind`] instead; this exists only for those callers.

use crate::error::McpError;
use crate::invoker::ToolResult;
use crate::protocol::describe_error_payload;

/// Render `result` the way the historical client reported it.
pub fn render_legacy(result: &ToolResult) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(e) => render_error(e),
    }
}

fn render_error(e: &McpError) -> String {
    match e {
        McpError::Tool(payload) => format!("❌ Error: {}", describe_error_payload(payload)),
        McpError::Timeout { .. } => "❌ Error: Request timeout".to_string(),
        McpError::ProcessDied { exit_code, stderr } => {
            format!("❌ MCP server process died. Exit code: {exit_code}. Stderr: {stderr}")
        }
        McpError::ServerUnresponsive => "❌ No response from server".to_string(),
        McpError::MalformedResponse(_) => "❌ Unexpected response format".to_string(),
        McpError::Startup { reason, .. } => format!("❌ Connection error: {reason}"),
        other => format!("❌ Connection error: {other}"),
    }
}

/// Substring check historical callers use to tell failures from results.
pub fn is_legacy_error(text: &str) -> bool {
    text.contains("Error")
}
