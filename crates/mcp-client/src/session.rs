//! A Session owns exactly one server connection and walks it through
//! `NotStarted → Starting → Ready → Stopped`.
//!
//! Start and handshake run lazily on first use. A failed start or
//! handshake lands in `Stopped` for good: partial state after a failure is
//! not reusable, so retrying means building a new Session (and therefore a
//! new process).

use std::time::Duration;

use mb_domain::config::{ClientConfig, Config};

use crate::channel::RequestChannel;
use crate::error::McpError;
use crate::handshake::{self, HandshakeConfig};
use crate::protocol::ServerInfo;
use crate::transport::{LaunchSpec, StdioTransport, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
}

/// Per-Session protocol settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub request_timeout: Duration,
    pub handshake: HandshakeConfig,
    /// Maximum stderr characters quoted in a process-death error.
    pub stderr_excerpt_chars: usize,
}

impl SessionOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            handshake: HandshakeConfig::from_config(config),
            stderr_excerpt_chars: config.stderr_excerpt_chars,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Where the transport comes from on start.
enum Source {
    Launch(LaunchSpec),
    Attached(Option<Box<dyn Transport>>),
}

pub struct Session {
    state: SessionState,
    source: Source,
    options: SessionOptions,
    channel: Option<RequestChannel>,
    server_info: Option<ServerInfo>,
}

impl Session {
    /// A Session that spawns the server described by `launch` on first use.
    pub fn new(launch: LaunchSpec, options: SessionOptions) -> Self {
        Self::with_source(Source::Launch(launch), options)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LaunchSpec::from_config(config),
            SessionOptions::from_config(&config.client),
        )
    }

    /// A Session over an already-connected transport. The handshake still
    /// runs lazily.
    pub fn with_transport(transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        Self::with_source(Source::Attached(Some(transport)), options)
    }

    fn with_source(source: Source, options: SessionOptions) -> Self {
        Self {
            state: SessionState::NotStarted,
            source,
            options,
            channel: None,
            server_info: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Server identity from the handshake, once `Ready`.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// The id the next request will carry, once `Ready`.
    pub fn next_request_id(&self) -> Option<u64> {
        self.channel.as_ref().map(RequestChannel::peek_next_id)
    }

    /// Start the transport and run the handshake. A no-op when already
    /// `Ready`; fails with [`McpError::SessionStopped`] once stopped.
    pub async fn start(&mut self) -> Result<(), McpError> {
        match self.state {
            SessionState::Ready => return Ok(()),
            SessionState::Stopped => return Err(McpError::SessionStopped),
            SessionState::Starting => {
                // Only reachable when an earlier start was cancelled midway.
                tracing::warn!("MCP session start was abandoned, stopping session");
                self.stop().await;
                return Err(McpError::SessionStopped);
            }
            SessionState::NotStarted => {}
        }

        self.state = SessionState::Starting;

        let transport = match self.open_transport().await {
            Ok(t) => t,
            Err(e) => {
                self.state = SessionState::Stopped;
                return Err(e);
            }
        };

        let mut channel = RequestChannel::new(transport, self.options.request_timeout);
        match handshake::perform(&mut channel, &self.options.handshake).await {
            Ok(init) => {
                self.server_info = init.server_info;
                self.channel = Some(channel);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "MCP handshake failed, stopping session");
                channel.transport_mut().terminate().await;
                self.state = SessionState::Stopped;
                Err(e)
            }
        }
    }

    async fn open_transport(&mut self) -> Result<Box<dyn Transport>, McpError> {
        match &mut self.source {
            Source::Launch(spec) => {
                let transport = StdioTransport::start(spec).await.map_err(startup_error)?;
                Ok(Box::new(transport))
            }
            Source::Attached(slot) => slot.take().ok_or(McpError::SessionStopped),
        }
    }

    /// The channel of a `Ready` Session, starting it first if needed.
    pub async fn ready_channel(&mut self) -> Result<&mut RequestChannel, McpError> {
        self.start().await?;
        self.channel.as_mut().ok_or(McpError::SessionStopped)
    }

    /// Whether the server behind a started Session is still running.
    pub fn is_process_alive(&mut self) -> bool {
        match self.channel.as_mut() {
            Some(channel) => channel.transport_mut().is_alive(),
            None => false,
        }
    }

    /// Terminate the server and release it. Safe to call in any state, any
    /// number of times.
    pub async fn stop(&mut self) {
        if let Some(channel) = self.channel.take() {
            let mut transport = channel.into_transport();
            transport.terminate().await;
        }
        if let Source::Attached(slot) = &mut self.source {
            if let Some(mut transport) = slot.take() {
                transport.terminate().await;
            }
        }
        if self.state != SessionState::Stopped {
            tracing::debug!(previous = ?self.state, "MCP session stopped");
        }
        self.state = SessionState::Stopped;
    }
}

fn startup_error(e: TransportError) -> McpError {
    match e {
        TransportError::ExitedDuringStartup { exit_code, stderr } => {
            let reason = format!(
                "MCP server died immediately. Exit code: {exit_code}. Stderr: {}",
                stderr.trim()
            );
            McpError::Startup {
                reason,
                exit_code: Some(exit_code),
                stderr,
            }
        }
        other => McpError::Startup {
            reason: other.to_string(),
            exit_code: None,
            stderr: String::new(),
        },
    }
}
