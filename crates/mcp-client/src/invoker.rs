//! Tool invocation on top of a [`Session`].
//!
//! `call_tool` and the named wrappers never return anything but a
//! [`ToolResult`]: every transport, protocol or server failure becomes an
//! [`McpError`] value.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use mb_domain::config::Config;

use crate::error::McpError;
use crate::protocol::{JsonRpcResponse, ToolCallParams, METHOD_TOOLS_CALL};
use crate::session::{Session, SessionState};
use crate::transport::ProcessStatus;

/// Outcome of one tool call: the tool's text, or why there is none.
pub type ToolResult = Result<String, McpError>;

/// Tool names exposed by the Masumi MCP server.
pub mod tools {
    pub const LIST_AGENTS: &str = "list_agents";
    pub const GET_AGENT_INPUT_SCHEMA: &str = "get_agent_input_schema";
    pub const HIRE_AGENT: &str = "hire_agent";
    pub const CHECK_JOB_STATUS: &str = "check_job_status";
    pub const GET_JOB_FULL_RESULT: &str = "get_job_full_result";
    pub const QUERY_PAYMENTS: &str = "query_payments";
    pub const QUERY_REGISTRY: &str = "query_registry";
    pub const REGISTER_AGENT: &str = "register_agent";
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent registration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Arguments for `register_agent`.
///
/// Values are passed through to the server untouched. Keys in `extra` are
/// merged into the top-level argument object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentRegistration {
    pub network: String,
    pub name: String,
    pub api_base_url: String,
    pub selling_wallet_vkey: String,
    pub capability_name: String,
    pub capability_version: String,
    pub base_price: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invoker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ToolInvoker {
    session: Session,
}

impl ToolInvoker {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// An invoker whose Session launches the server described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Session::from_config(config))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Start the server and handshake eagerly. Calls do this on their own
    /// when needed; use this to surface startup failures early.
    pub async fn start(&mut self) -> Result<(), McpError> {
        self.session.start().await
    }

    pub async fn stop(&mut self) {
        self.session.stop().await;
    }

    /// Invoke `name` with `arguments` and return the first text content
    /// block of the result.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> ToolResult {
        let excerpt_chars = self.session.options().stderr_excerpt_chars;
        let channel = self.session.ready_channel().await?;

        if let ProcessStatus::Exited(exit_code) = channel.transport_mut().status() {
            let stderr = channel.transport_mut().drain_diagnostics().await;
            let stderr = truncate_chars(stderr.trim(), excerpt_chars);
            tracing::warn!(tool = name, exit_code, stderr = %stderr, "MCP server process died");
            return Err(McpError::ProcessDied { exit_code, stderr });
        }

        tracing::info!(tool = name, "calling MCP tool");

        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let response = channel.request(METHOD_TOOLS_CALL, Some(params)).await?;
        let outcome = interpret_tool_response(response);
        if let Err(e) = &outcome {
            tracing::warn!(tool = name, kind = %e.kind(), error = %e, "MCP tool call failed");
        }
        outcome
    }

    // ── Named wrappers ─────────────────────────────────────────────────

    pub async fn list_agents(&mut self) -> ToolResult {
        self.call_tool(tools::LIST_AGENTS, json!({})).await
    }

    pub async fn get_agent_input_schema(
        &mut self,
        agent_identifier: &str,
        api_base_url: &str,
    ) -> ToolResult {
        let args = json!({
            "agent_identifier": agent_identifier,
            "api_base_url": api_base_url,
        });
        self.call_tool(tools::GET_AGENT_INPUT_SCHEMA, args).await
    }

    pub async fn hire_agent(
        &mut self,
        agent_identifier: &str,
        api_base_url: &str,
        input_data: Value,
    ) -> ToolResult {
        let args = json!({
            "agent_identifier": agent_identifier,
            "api_base_url": api_base_url,
            "input_data": input_data,
        });
        self.call_tool(tools::HIRE_AGENT, args).await
    }

    pub async fn check_job_status(
        &mut self,
        agent_identifier: &str,
        api_base_url: &str,
        job_id: &str,
    ) -> ToolResult {
        let args = job_args(agent_identifier, api_base_url, job_id);
        self.call_tool(tools::CHECK_JOB_STATUS, args).await
    }

    pub async fn get_job_full_result(
        &mut self,
        agent_identifier: &str,
        api_base_url: &str,
        job_id: &str,
    ) -> ToolResult {
        let args = job_args(agent_identifier, api_base_url, job_id);
        self.call_tool(tools::GET_JOB_FULL_RESULT, args).await
    }

    pub async fn query_payments(&mut self, network: &str, limit: u32) -> ToolResult {
        let args = json!({ "network": network, "limit": limit });
        self.call_tool(tools::QUERY_PAYMENTS, args).await
    }

    pub async fn query_registry(&mut self, network: &str) -> ToolResult {
        self.call_tool(tools::QUERY_REGISTRY, json!({ "network": network }))
            .await
    }

    pub async fn register_agent(&mut self, registration: &AgentRegistration) -> ToolResult {
        let args = serde_json::to_value(registration)
            .map_err(|e| McpError::Protocol(format!("failed to encode registration: {e}")))?;
        self.call_tool(tools::REGISTER_AGENT, args).await
    }
}

fn job_args(agent_identifier: &str, api_base_url: &str, job_id: &str) -> Value {
    json!({
        "agent_identifier": agent_identifier,
        "api_base_url": api_base_url,
        "job_id": job_id,
    })
}

/// Map a `tools/call` reply onto a [`ToolResult`].
///
/// `error` wins over `result`; a result without `content[0].text` is
/// malformed.
pub fn interpret_tool_response(response: JsonRpcResponse) -> ToolResult {
    if let Some(error) = response.error {
        return Err(McpError::Tool(error));
    }

    let Some(result) = response.result else {
        return Err(McpError::MalformedResponse(
            "reply has neither result nor error".into(),
        ));
    };

    match result.pointer("/content/0/text").and_then(Value::as_str) {
        Some(text) => {
            if result.get("isError").and_then(Value::as_bool) == Some(true) {
                tracing::warn!("MCP tool reported isError, returning its text");
            }
            Ok(text.to_string())
        }
        None => Err(McpError::MalformedResponse(format!(
            "no text content in result: {}",
            truncate_chars(&result.to_string(), 120)
        ))),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
