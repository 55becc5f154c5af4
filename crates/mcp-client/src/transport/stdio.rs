//! Stdio transport: the server runs as a child process and speaks
//! newline-delimited JSON over stdin/stdout.
//!
//! Stdout and stderr are pumped by background tasks. Stdout lines go into a
//! bounded channel, so a read that times out never loses a line: it is
//! delivered to the next read instead. Stderr is logged and kept (bounded)
//! for startup and process-death diagnostics.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mb_domain::config::Config;

use super::{LineRead, ProcessStatus, Transport, TransportError};
use crate::env::EnvSpec;

/// Stdout lines buffered ahead of the reader.
const LINE_BUFFER: usize = 64;

/// Cap on retained stderr; older output is kept, newer output dropped.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// How long to wait for the stderr pump to hit EOF after the process died.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Launch spec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything needed to start one server process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: EnvSpec,
    /// Wait after spawning before checking the process survived.
    pub startup_grace: Duration,
    /// How long `terminate` waits for a graceful exit before killing.
    pub shutdown_timeout: Duration,
}

impl LaunchSpec {
    /// `<interpreter> <script> <args...>` in the script's directory.
    pub fn from_config(config: &Config) -> Self {
        let server = &config.server;
        let mut args = Vec::with_capacity(server.args.len() + 1);
        args.push(server.script.to_string_lossy().into_owned());
        args.extend(server.args.iter().cloned());

        Self {
            program: server.interpreter.clone(),
            args,
            working_dir: server.effective_working_dir(),
            env: EnvSpec::from_config(server),
            startup_grace: Duration::from_millis(config.client.startup_grace_ms),
            shutdown_timeout: Duration::from_millis(config.client.shutdown_timeout_ms),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stdio transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StdioTransport {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: mpsc::Receiver<String>,
    stderr: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
    exit_code: Option<i32>,
    shutdown_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server and make sure it survives the startup grace window.
    ///
    /// A process that is already gone after the grace interval yields
    /// [`TransportError::ExitedDuringStartup`] with its exit code and
    /// whatever it wrote to stderr.
    pub async fn start(spec: &LaunchSpec) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .env_clear()
            .envs(spec.env.build())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        tracing::info!(
            program = %spec.program,
            args = ?spec.args,
            cwd = ?spec.working_dir,
            "starting MCP server"
        );

        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| broken_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| broken_pipe("stdout"))?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| broken_pipe("stderr"))?;

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        tokio::spawn(pump_stdout(stdout, tx));

        let stderr = Arc::new(Mutex::new(String::new()));
        let stderr_task = tokio::spawn(pump_stderr(stderr_pipe, stderr.clone()));

        let mut transport = Self {
            program: spec.program.clone(),
            child: Some(child),
            stdin: Some(stdin),
            lines,
            stderr,
            stderr_task: Some(stderr_task),
            exit_code: None,
            shutdown_timeout: spec.shutdown_timeout,
        };

        tokio::time::sleep(spec.startup_grace).await;

        if let ProcessStatus::Exited(exit_code) = transport.status() {
            let stderr = transport.drain_diagnostics().await;
            tracing::warn!(
                program = %transport.program,
                exit_code,
                stderr = %stderr.trim(),
                "MCP server exited during startup"
            );
            return Err(TransportError::ExitedDuringStartup { exit_code, stderr });
        }

        tracing::debug!(program = %transport.program, "MCP server process running");
        Ok(transport)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::ProcessExited);
        }
        let stdin = self.stdin.as_mut().ok_or(TransportError::PipeClosed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => Ok(LineRead::Line(line)),
            Ok(None) => Ok(LineRead::Closed),
            Err(_) => Ok(LineRead::TimedOut),
        }
    }

    fn status(&mut self) -> ProcessStatus {
        if let Some(code) = self.exit_code {
            return ProcessStatus::Exited(code);
        }
        let Some(child) = self.child.as_mut() else {
            return ProcessStatus::Exited(-1);
        };
        match child.try_wait() {
            Ok(None) => ProcessStatus::Running,
            Ok(Some(status)) => {
                let code = exit_code_of(status);
                self.exit_code = Some(code);
                ProcessStatus::Exited(code)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll MCP server process, assuming dead");
                ProcessStatus::Exited(-1)
            }
        }
    }

    async fn drain_diagnostics(&mut self) -> String {
        if !self.is_alive() {
            if let Some(task) = self.stderr_task.take() {
                if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await.is_err() {
                    tracing::debug!("stderr still open after process exit, using what was captured");
                }
            }
        }
        self.stderr.lock().clone()
    }

    async fn terminate(&mut self) {
        // Closing stdin is the shutdown signal for stdio MCP servers.
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                tracing::debug!(error = %e, "error closing MCP server stdin");
            }
        }

        let Some(mut child) = self.child.take() else {
            return;
        };

        send_terminate(&child);

        let status = match tokio::time::timeout(self.shutdown_timeout, child.wait()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(program = %self.program, "MCP server process did not exit within timeout, killing");
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "failed to kill MCP server process");
                }
                child.wait().await
            }
        };

        match status {
            Ok(status) => {
                self.exit_code = Some(exit_code_of(status));
                tracing::debug!(?status, program = %self.program, "MCP server process exited");
            }
            Err(e) => {
                tracing::warn!(error = %e, "error waiting for MCP server process");
                self.exit_code = Some(-1);
            }
        }
    }
}

/// Ask the process to exit with SIGTERM.
#[cfg(unix)]
fn send_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // `id` is `None` once the child has been reaped.
    let Some(pid) = child.id() else {
        return;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::debug!(error = %e, pid, "failed to send SIGTERM to MCP server"),
    }
}

#[cfg(not(unix))]
fn send_terminate(_child: &Child) {}

// ── Pipe pumps ────────────────────────────────────────────────────────

// Lines are split on raw bytes. Invalid UTF-8 becomes U+FFFD, so a bad reply
// fails JSON parsing in the request channel and the pump keeps reading.

async fn pump_stdout(stdout: ChildStdout, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_line(&buf)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "error reading MCP server stdout");
                break;
            }
        }
    }
}

async fn pump_stderr(stderr: ChildStderr, buffer: Arc<Mutex<String>>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                tracing::debug!(server_stderr = %line, "MCP server stderr");
                let mut kept = buffer.lock();
                if kept.len() + line.len() < MAX_STDERR_BYTES {
                    kept.push_str(&line);
                    kept.push('\n');
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "error reading MCP server stderr");
                break;
            }
        }
    }
}

/// One line without its terminator, decoded lossily.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn broken_pipe(which: &str) -> TransportError {
    TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("failed to capture child {which}"),
    ))
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn launch_spec_runs_script_with_stdio_argument() {
        let mut config = Config::default();
        config.server.interpreter = "/usr/bin/python3".into();
        config.server.script = PathBuf::from("/opt/masumi-mcp-server/server.py");

        let spec = LaunchSpec::from_config(&config);
        assert_eq!(spec.program, "/usr/bin/python3");
        assert_eq!(
            spec.args,
            vec!["/opt/masumi-mcp-server/server.py".to_string(), "stdio".to_string()]
        );
        assert_eq!(
            spec.working_dir.as_deref(),
            Some(Path::new("/opt/masumi-mcp-server"))
        );
        assert_eq!(spec.startup_grace, Duration::from_millis(500));
    }

    #[test]
    fn decode_line_strips_terminators() {
        assert_eq!(decode_line(b"{\"id\":1}\r\n"), "{\"id\":1}");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[test]
    fn decode_line_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"\xff\xfe garbage\n"), "\u{FFFD}\u{FFFD} garbage");
    }

    #[tokio::test]
    async fn spawn_failure_names_program() {
        let spec = LaunchSpec {
            program: "/definitely/not/a/real/interpreter".into(),
            args: Vec::new(),
            working_dir: None,
            env: EnvSpec::default(),
            startup_grace: Duration::from_millis(10),
            shutdown_timeout: Duration::from_millis(100),
        };
        let err = StdioTransport::start(&spec).await.err().unwrap();
        match err {
            TransportError::Spawn { program, .. } => {
                assert_eq!(program, "/definitely/not/a/real/interpreter");
            }
            other => panic!("expected Spawn, got {other:?}"),
        }
    }
}
