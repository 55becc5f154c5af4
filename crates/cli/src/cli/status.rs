//! `masumi-bridge status`: network health summary.
//!
//! The registry query and the agent listing run on two independent
//! Sessions (two server processes) at the same time.

use futures_util::future::join;
use serde::Serialize;
use serde_json::Value;

use mb_domain::config::Config;
use mb_mcp_client::{ErrorKind, ToolInvoker, ToolResult};

use super::tool::OutputMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// Agent listing works.
    Operational,
    /// Registry answers, agent listing does not yet.
    Connecting,
    /// The server runs but both tools fail.
    Limited,
    /// The server could not be started or did not complete the handshake.
    Unreachable,
}

impl NetworkStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::Connecting => "Connecting",
            Self::Limited => "Limited Connectivity",
            Self::Unreachable => "Connection Issues",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn from_result(result: &ToolResult) -> Self {
        match result {
            Ok(_) => Self {
                ok: true,
                kind: None,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                kind: Some(e.kind()),
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: NetworkStatus,
    pub network: String,
    pub registry: ProbeOutcome,
    pub agents: ProbeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_count: Option<usize>,
}

impl StatusReport {
    pub fn from_results(network: &str, registry: &ToolResult, agents: &ToolResult) -> Self {
        let status = match (registry, agents) {
            (_, Ok(_)) => NetworkStatus::Operational,
            (Ok(_), Err(_)) => NetworkStatus::Connecting,
            (Err(a), Err(b)) if is_connection_failure(a.kind()) && is_connection_failure(b.kind()) => {
                NetworkStatus::Unreachable
            }
            (Err(_), Err(_)) => NetworkStatus::Limited,
        };

        Self {
            status,
            network: network.to_string(),
            registry: ProbeOutcome::from_result(registry),
            agents: ProbeOutcome::from_result(agents),
            agent_count: agents.as_ref().ok().and_then(|text| count_agents(text)),
        }
    }
}

fn is_connection_failure(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Startup | ErrorKind::Handshake | ErrorKind::SessionStopped
    )
}

/// Number of agents in a listing: a top-level JSON array, or an `agents`
/// array inside an object.
pub fn count_agents(text: &str) -> Option<usize> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => map.get("agents").and_then(Value::as_array).map(Vec::len),
        _ => None,
    }
}

pub async fn run(config: &Config, mode: OutputMode) -> anyhow::Result<bool> {
    let network = config.defaults.network.clone();

    let mut registry = ToolInvoker::from_config(config);
    let mut agents = ToolInvoker::from_config(config);

    let (registry_result, agents_result) =
        join(registry.query_registry(&network), agents.list_agents()).await;
    join(registry.stop(), agents.stop()).await;

    tracing::debug!(
        registry_ok = registry_result.is_ok(),
        agents_ok = agents_result.is_ok(),
        "status probes finished"
    );

    let report = StatusReport::from_results(&network, &registry_result, &agents_result);
    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputMode::Text | OutputMode::Legacy => print_report(&report),
    }

    Ok(report.status != NetworkStatus::Unreachable)
}

fn print_report(report: &StatusReport) {
    println!("Masumi network status: {}", report.status.label());
    println!("  network:  {}", report.network);
    print_probe("registry", &report.registry);
    print_probe("agents", &report.agents);
    if let Some(count) = report.agent_count {
        println!("  {count} agent(s) discovered");
    }
}

fn print_probe(name: &str, probe: &ProbeOutcome) {
    match (&probe.kind, &probe.error) {
        (Some(kind), Some(error)) => println!("  {name:<9} FAIL [{kind}] {error}"),
        _ => println!("  {name:<9} OK"),
    }
}
