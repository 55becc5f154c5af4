//! The one-time `initialize` / `notifications/initialized` exchange.

use crate::channel::RequestChannel;
use crate::error::McpError;
use crate::protocol::{
    self, describe_error_payload, ClientInfo, InitializeResult, METHOD_INITIALIZE,
};

/// What the client announces during `initialize`.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub protocol_version: String,
    pub client: ClientInfo,
}

impl HandshakeConfig {
    pub fn from_config(config: &mb_domain::config::ClientConfig) -> Self {
        Self {
            protocol_version: config.protocol_version.clone(),
            client: ClientInfo {
                name: config.name.clone(),
                version: config.version.clone(),
            },
        }
    }
}

/// Run the handshake. Every failure is reported as
/// [`McpError::Handshake`]; the caller decides what happens to the Session.
pub async fn perform(
    channel: &mut RequestChannel,
    config: &HandshakeConfig,
) -> Result<InitializeResult, McpError> {
    // Step 1: Send `initialize` request.
    let params = protocol::initialize_params(&config.protocol_version, &config.client);
    let response = channel
        .request(METHOD_INITIALIZE, Some(params))
        .await
        .map_err(|e| McpError::Handshake(format!("initialize: {e}")))?;

    tracing::debug!(response = ?response, "MCP initialize response received");

    if let Some(error) = &response.error {
        return Err(McpError::Handshake(format!(
            "server rejected initialize: {}",
            describe_error_payload(error)
        )));
    }

    let result = response
        .result
        .ok_or_else(|| McpError::Handshake("initialize response has no result".into()))?;
    let init: InitializeResult = serde_json::from_value(result)
        .map_err(|e| McpError::Handshake(format!("invalid initialize result: {e}")))?;

    if let Some(version) = &init.protocol_version {
        if version != &config.protocol_version {
            tracing::warn!(
                requested = %config.protocol_version,
                negotiated = %version,
                "MCP server negotiated a different protocol version"
            );
        }
    }

    // Step 2: Send `notifications/initialized` notification.
    channel
        .send_notification(&protocol::initialized_notification())
        .await
        .map_err(|e| McpError::Handshake(format!("initialized notification: {e}")))?;

    let server = init.server_info.clone().unwrap_or_default();
    tracing::info!(
        server_name = %server.name,
        server_version = %server.version,
        "MCP server initialized"
    );

    Ok(init)
}
