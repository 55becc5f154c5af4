pub mod config;
pub mod doctor;
pub mod status;
pub mod tool;

use std::path::Path;

use clap::{Args, Parser, Subcommand};

use tool::{OutputMode, ToolCommand};

/// masumi-bridge: call Masumi network tools through the MCP server.
#[derive(Debug, Parser)]
#[command(name = "masumi-bridge", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub output: OutputArgs,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct OutputArgs {
    /// Print results as a JSON envelope.
    #[arg(long, global = true, conflicts_with = "legacy")]
    pub json: bool,

    /// Print results in the historical text form (failures start with ❌).
    #[arg(long, global = true)]
    pub legacy: bool,
}

impl OutputArgs {
    pub fn mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.legacy {
            OutputMode::Legacy
        } else {
            OutputMode::Text
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Tool(ToolCommand),
    /// Check registry and agent listing concurrently and summarize
    /// network health.
    Status,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Environment file read into the process environment before anything else.
pub const ENV_FILE: &str = ".env";

/// Load `path` into the process environment. Variables that are already
/// set keep their value. Returns `false` when the file is missing or
/// unreadable.
pub fn load_env_file(path: &Path) -> bool {
    match dotenv::from_path(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "loaded environment file");
            true
        }
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring environment file");
            false
        }
    }
}

/// Load `.env`, then the configuration from the path specified by
/// `MB_CONFIG` (or `masumi.toml` by default), and apply environment
/// overrides. Returns the parsed [`Config`](mb_domain::config::Config) and
/// the path that was used.
pub fn load_config() -> anyhow::Result<(mb_domain::config::Config, String)> {
    load_env_file(Path::new(ENV_FILE));

    let config_path = std::env::var("MB_CONFIG").unwrap_or_else(|_| "masumi.toml".into());

    let mut config = mb_domain::config::Config::load(Path::new(&config_path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    config.apply_env_overrides();

    Ok((config, config_path))
}
