//! One request/response exchange at a time over a [`Transport`].
//!
//! Every method takes `&mut self`, so a second request cannot be issued
//! while one is outstanding; there is no queueing and no demultiplexing.
//!
//! A reply that misses its deadline may still arrive later. Replies are
//! therefore matched on `id`: anything answering an earlier request is
//! discarded instead of being mistaken for the current reply.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::McpError;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::transport::{LineRead, Transport};

pub struct RequestChannel {
    transport: Box<dyn Transport>,
    next_id: u64,
    timeout: Duration,
}

impl RequestChannel {
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            next_id: 1,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The id the next request will carry.
    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn into_transport(self) -> Box<dyn Transport> {
        self.transport
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Build a request with a fresh id and wait for its reply.
    pub async fn request<P: Serialize>(
        &mut self,
        method: &str,
        params: Option<P>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.allocate_id();
        let request = JsonRpcRequest::new(id, method, params);
        self.send(&request).await
    }

    /// Write `request` and wait, bounded by the channel timeout, for the
    /// reply carrying its id.
    pub async fn send<P: Serialize>(
        &mut self,
        request: &JsonRpcRequest<P>,
    ) -> Result<JsonRpcResponse, McpError> {
        let line = serde_json::to_string(request)
            .map_err(|e| McpError::Protocol(format!("failed to serialize request: {e}")))?;

        tracing::debug!(id = request.id, method = %request.method, "sending MCP request");
        self.transport.write_line(&line).await?;
        self.await_reply(request.id, &request.method).await
    }

    /// Write a notification. Nothing is read back.
    pub async fn send_notification(
        &mut self,
        notification: &JsonRpcNotification,
    ) -> Result<(), McpError> {
        let line = serde_json::to_string(notification)
            .map_err(|e| McpError::Protocol(format!("failed to serialize notification: {e}")))?;
        tracing::debug!(method = %notification.method, "sending MCP notification");
        self.transport.write_line(&line).await?;
        Ok(())
    }

    /// Send an arbitrary JSON-RPC message.
    ///
    /// Waits for a reply only when the message carries an `id`; a message
    /// without one is a notification and returns `Ok(None)` right after the
    /// write.
    pub async fn dispatch(&mut self, message: &Value) -> Result<Option<JsonRpcResponse>, McpError> {
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        let id = message.get("id").and_then(Value::as_u64);

        self.transport.write_line(&message.to_string()).await?;

        match id {
            Some(id) => {
                if id >= self.next_id {
                    self.next_id = id + 1;
                }
                tracing::debug!(id, method = %method, "sent raw MCP request");
                self.await_reply(id, &method).await.map(Some)
            }
            None => {
                tracing::debug!(method = %method, "sent raw MCP notification, not waiting for a reply");
                Ok(None)
            }
        }
    }

    async fn await_reply(&mut self, id: u64, method: &str) -> Result<JsonRpcResponse, McpError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.transport.read_line(remaining).await? {
                LineRead::Line(line) => line,
                LineRead::TimedOut => {
                    tracing::warn!(id, method, timeout_ms = self.timeout.as_millis() as u64, "MCP request timed out");
                    return Err(McpError::Timeout {
                        method: method.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                LineRead::Closed => {
                    tracing::warn!(id, method, "MCP server closed stdout before replying");
                    return Err(McpError::ServerUnresponsive);
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                McpError::Protocol(format!("reply is not valid JSON ({e}): {}", excerpt(trimmed)))
            })?;
            if !value.is_object() {
                return Err(McpError::Protocol(format!(
                    "reply is not a JSON object: {}",
                    excerpt(trimmed)
                )));
            }

            // Server-initiated traffic (notifications, requests) has a method.
            if let Some(server_method) = value.get("method").and_then(Value::as_str) {
                tracing::debug!(method = %server_method, "skipping server-initiated message");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| McpError::Protocol(format!("malformed JSON-RPC reply: {e}")))?;

            // A reply without an id can only answer the single outstanding
            // request.
            let is_ours = match response.id.as_ref() {
                None | Some(Value::Null) => true,
                Some(_) => response.numeric_id() == Some(id),
            };
            if is_ours {
                return Ok(response);
            }
            tracing::debug!(
                expected_id = id,
                got_id = ?response.id,
                "discarding stale reply for an earlier request"
            );
        }
    }
}

fn excerpt(line: &str) -> String {
    const MAX: usize = 120;
    match line.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}
