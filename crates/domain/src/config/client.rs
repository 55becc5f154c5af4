use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Protocol client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client-side protocol settings: identity sent during `initialize` and
/// the deadlines applied to each Session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// `clientInfo.name` reported to the server.
    #[serde(default = "d_name")]
    pub name: String,

    /// `clientInfo.version` reported to the server.
    #[serde(default = "d_version")]
    pub version: String,

    #[serde(default = "d_protocol_version")]
    pub protocol_version: String,

    /// Deadline for reading one reply line.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long to wait after spawning before checking the process is
    /// still alive.
    #[serde(default = "d_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// How long `stop()` waits for a graceful exit before killing.
    #[serde(default = "d_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Maximum stderr characters quoted in a process-death error.
    #[serde(default = "d_stderr_excerpt_chars")]
    pub stderr_excerpt_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            version: d_version(),
            protocol_version: d_protocol_version(),
            request_timeout_ms: d_request_timeout_ms(),
            startup_grace_ms: d_startup_grace_ms(),
            shutdown_timeout_ms: d_shutdown_timeout_ms(),
            stderr_excerpt_chars: d_stderr_excerpt_chars(),
        }
    }
}

fn d_name() -> String {
    "masumi-bridge".into()
}

fn d_version() -> String {
    "1.0.0".into()
}

fn d_protocol_version() -> String {
    "2024-11-05".into()
}

fn d_request_timeout_ms() -> u64 {
    5_000
}

fn d_startup_grace_ms() -> u64 {
    500
}

fn d_shutdown_timeout_ms() -> u64 {
    5_000
}

fn d_stderr_excerpt_chars() -> usize {
    200
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool argument defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default values for tool arguments the caller may omit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Masumi network name (`"Preprod"` or `"Mainnet"`).
    #[serde(default = "d_network")]
    pub network: String,

    /// Page size for `query_payments`.
    #[serde(default = "d_payments_limit")]
    pub payments_limit: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            network: d_network(),
            payments_limit: d_payments_limit(),
        }
    }
}

fn d_network() -> String {
    "Preprod".into()
}

fn d_payments_limit() -> u32 {
    10
}
