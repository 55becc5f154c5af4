//! Tool subcommands: one Session per invocation, stopped before printing.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};

use mb_domain::config::{Config, DefaultsConfig};
use mb_mcp_client::{render_legacy, AgentRegistration, ToolInvoker, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
    Legacy,
}

#[derive(Debug, Subcommand)]
pub enum ToolCommand {
    /// List agents known to the Masumi network.
    ListAgents,
    /// Show the input schema an agent expects.
    AgentSchema {
        agent_identifier: String,
        #[arg(long)]
        api_base_url: String,
    },
    /// Hire an agent to run a job.
    Hire {
        agent_identifier: String,
        #[arg(long)]
        api_base_url: String,
        /// Job input as JSON, or `@path` to read it from a file.
        #[arg(long, default_value = "{}")]
        input: String,
    },
    /// Check the status of a job.
    JobStatus {
        agent_identifier: String,
        job_id: String,
        #[arg(long)]
        api_base_url: String,
    },
    /// Fetch the full result of a finished job.
    JobResult {
        agent_identifier: String,
        job_id: String,
        #[arg(long)]
        api_base_url: String,
    },
    /// Query payment history.
    Payments {
        /// Network name (defaults to `defaults.network`).
        #[arg(long)]
        network: Option<String>,
        /// Number of entries (defaults to `defaults.payments_limit`).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Query the agent registry.
    Registry {
        #[arg(long)]
        network: Option<String>,
    },
    /// Register an agent from a JSON description.
    Register {
        /// JSON file with the registration fields.
        #[arg(long)]
        file: PathBuf,
        /// Network to register on when the file does not name one.
        #[arg(long)]
        network: Option<String>,
    },
    /// Call any tool with raw JSON arguments.
    Call {
        tool: String,
        /// Arguments as a JSON object, or `@path` to read them from a file.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Run one tool command and print its result.
///
/// Returns `Ok(false)` when the tool call failed; usage errors (bad JSON,
/// unreadable files) are `Err`.
pub async fn run(config: &Config, command: ToolCommand, mode: OutputMode) -> anyhow::Result<bool> {
    let mut invoker = ToolInvoker::from_config(config);
    let outcome = invoke(&mut invoker, &config.defaults, command).await;
    invoker.stop().await;

    let result = outcome?;
    print_result(&result, mode);
    Ok(result.is_ok())
}

async fn invoke(
    invoker: &mut ToolInvoker,
    defaults: &DefaultsConfig,
    command: ToolCommand,
) -> anyhow::Result<ToolResult> {
    let network_or_default = |network: Option<String>| network.unwrap_or_else(|| defaults.network.clone());

    let result = match command {
        ToolCommand::ListAgents => invoker.list_agents().await,
        ToolCommand::AgentSchema {
            agent_identifier,
            api_base_url,
        } => {
            invoker
                .get_agent_input_schema(&agent_identifier, &api_base_url)
                .await
        }
        ToolCommand::Hire {
            agent_identifier,
            api_base_url,
            input,
        } => {
            let input = parse_json_arg("--input", &input)?;
            invoker
                .hire_agent(&agent_identifier, &api_base_url, input)
                .await
        }
        ToolCommand::JobStatus {
            agent_identifier,
            job_id,
            api_base_url,
        } => {
            invoker
                .check_job_status(&agent_identifier, &api_base_url, &job_id)
                .await
        }
        ToolCommand::JobResult {
            agent_identifier,
            job_id,
            api_base_url,
        } => {
            invoker
                .get_job_full_result(&agent_identifier, &api_base_url, &job_id)
                .await
        }
        ToolCommand::Payments { network, limit } => {
            let network = network_or_default(network);
            let limit = limit.unwrap_or(defaults.payments_limit);
            invoker.query_payments(&network, limit).await
        }
        ToolCommand::Registry { network } => {
            invoker.query_registry(&network_or_default(network)).await
        }
        ToolCommand::Register { file, network } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let registration = parse_registration(&raw, &network_or_default(network))?;
            invoker.register_agent(&registration).await
        }
        ToolCommand::Call { tool, args } => {
            let args = parse_json_arg("--args", &args)?;
            if !args.is_object() {
                anyhow::bail!("--args must be a JSON object");
            }
            invoker.call_tool(&tool, args).await
        }
    };

    Ok(result)
}

/// Parse a JSON argument given inline or as `@path`.
pub fn parse_json_arg(flag: &str, raw: &str) -> anyhow::Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {flag} file {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).with_context(|| format!("{flag} is not valid JSON"))
}

/// Parse a registration description, filling in `network` when absent.
pub fn parse_registration(raw: &str, default_network: &str) -> anyhow::Result<AgentRegistration> {
    let mut value: Value = serde_json::from_str(raw).context("registration is not valid JSON")?;
    let object = value
        .as_object_mut()
        .context("registration must be a JSON object")?;
    object
        .entry("network")
        .or_insert_with(|| Value::String(default_network.to_string()));
    serde_json::from_value(value).context("registration is missing required fields")
}

// ── Output ────────────────────────────────────────────────────────────

pub fn print_result(result: &ToolResult, mode: OutputMode) {
    match mode {
        OutputMode::Text => match result {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error [{}]: {e}", e.kind()),
        },
        OutputMode::Legacy => println!("{}", render_legacy(result)),
        OutputMode::Json => println!("{}", json_envelope(result)),
    }
}

/// `{"ok":true,"text":…}` or `{"ok":false,"kind":…,"error":…}`.
pub fn json_envelope(result: &ToolResult) -> Value {
    match result {
        Ok(text) => json!({ "ok": true, "text": text }),
        Err(e) => json!({ "ok": false, "kind": e.kind(), "error": e.to_string() }),
    }
}
