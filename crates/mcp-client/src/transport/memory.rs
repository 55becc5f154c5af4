//! In-memory transport for exercising the client without a process.
//!
//! Each written line is handed to a responder closure whose returned lines
//! become readable. A [`MemoryHandle`] lets the test side inject extra
//! lines, inspect what the client wrote, and simulate the server dying.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{LineRead, ProcessStatus, Transport, TransportError};

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct Shared {
    written: Vec<String>,
    exit_code: Option<i32>,
    stderr: String,
    stdout_closed: bool,
    terminated: bool,
}

pub struct MemoryTransport {
    responder: Responder,
    replies_tx: mpsc::UnboundedSender<String>,
    replies_rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<Mutex<Shared>>,
}

/// Test-side remote control for a [`MemoryTransport`].
#[derive(Clone)]
pub struct MemoryHandle {
    replies: mpsc::UnboundedSender<String>,
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// A transport whose server answers each written line with the lines
    /// returned by `responder`.
    pub fn new(responder: impl FnMut(&str) -> Vec<String> + Send + 'static) -> (Self, MemoryHandle) {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = MemoryHandle {
            replies: replies_tx.clone(),
            shared: shared.clone(),
        };
        let transport = Self {
            responder: Box::new(responder),
            replies_tx,
            replies_rx,
            shared,
        };
        (transport, handle)
    }

    /// A server that never says anything on its own.
    pub fn silent() -> (Self, MemoryHandle) {
        Self::new(|_| Vec::new())
    }

    /// A minimal MCP server: answers `initialize`, ignores notifications,
    /// and routes `tools/call` to `tool`. `Ok(text)` becomes
    /// `result.content[0].text`, `Err(payload)` becomes `error`.
    pub fn mcp_server(
        mut tool: impl FnMut(&str, &Value) -> Result<String, Value> + Send + 'static,
    ) -> (Self, MemoryHandle) {
        Self::new(move |line| {
            let Ok(message) = serde_json::from_str::<Value>(line) else {
                return Vec::new();
            };
            let Some(id) = message.get("id").cloned() else {
                return Vec::new();
            };
            let reply = match message.get("method").and_then(Value::as_str) {
                Some("initialize") => serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": { "tools": {} },
                        "serverInfo": { "name": "memory-stub", "version": "0.0.0" }
                    }
                }),
                Some("tools/call") => {
                    let params = message.get("params").cloned().unwrap_or(Value::Null);
                    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                    match tool(name, &arguments) {
                        Ok(text) => serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": { "content": [{ "type": "text", "text": text }] }
                        }),
                        Err(error) => serde_json::json!({ "jsonrpc": "2.0", "id": id, "error": error }),
                    }
                }
                _ => serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": "Method not found" }
                }),
            };
            vec![reply.to_string()]
        })
    }
}

impl MemoryHandle {
    /// Make a line readable as if the server had written it.
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.replies.send(line.into());
    }

    /// Every line the client wrote, in order.
    pub fn written(&self) -> Vec<String> {
        self.shared.lock().written.clone()
    }

    /// Written lines parsed as JSON; unparsable lines are skipped.
    pub fn written_json(&self) -> Vec<Value> {
        self.written()
            .iter()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Simulate the server process exiting.
    pub fn exit(&self, exit_code: i32, stderr: &str) {
        let mut shared = self.shared.lock();
        shared.exit_code = Some(exit_code);
        shared.stderr.push_str(stderr);
    }

    /// Simulate the server closing stdout while staying alive.
    pub fn close_stdout(&self) {
        self.shared.lock().stdout_closed = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.lock().terminated
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        {
            let mut shared = self.shared.lock();
            if shared.exit_code.is_some() {
                return Err(TransportError::ProcessExited);
            }
            if shared.terminated {
                return Err(TransportError::PipeClosed);
            }
            shared.written.push(line.to_string());
        }
        for reply in (self.responder)(line) {
            let _ = self.replies_tx.send(reply);
        }
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        if let Ok(line) = self.replies_rx.try_recv() {
            return Ok(LineRead::Line(line));
        }
        let closed = {
            let shared = self.shared.lock();
            shared.stdout_closed || shared.exit_code.is_some() || shared.terminated
        };
        if closed {
            return Ok(LineRead::Closed);
        }
        match tokio::time::timeout(timeout, self.replies_rx.recv()).await {
            Ok(Some(line)) => Ok(LineRead::Line(line)),
            Ok(None) => Ok(LineRead::Closed),
            Err(_) => Ok(LineRead::TimedOut),
        }
    }

    fn status(&mut self) -> ProcessStatus {
        match self.shared.lock().exit_code {
            Some(code) => ProcessStatus::Exited(code),
            None => ProcessStatus::Running,
        }
    }

    async fn drain_diagnostics(&mut self) -> String {
        self.shared.lock().stderr.clone()
    }

    async fn terminate(&mut self) {
        let mut shared = self.shared.lock();
        shared.terminated = true;
        if shared.exit_code.is_none() {
            shared.exit_code = Some(0);
        }
    }
}
