use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool server process
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How to launch the tool-serving process.
///
/// The process is started as `<interpreter> <script> <args...>` with the
/// script's directory as working directory unless `working_dir` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interpreter used to run the server script (e.g. `"python3"`).
    #[serde(default = "d_interpreter")]
    pub interpreter: String,

    /// Path to the server script.
    #[serde(default = "d_script")]
    pub script: PathBuf,

    /// Arguments appended after the script path.
    #[serde(default = "d_args")]
    pub args: Vec<String>,

    /// Working directory override. Defaults to the script's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Module search roots handed to the server runtime.
    #[serde(default = "d_search_paths")]
    pub search_paths: Vec<PathBuf>,

    /// Variable that receives `search_paths`, joined with the platform
    /// separator. `None` disables the variable entirely.
    #[serde(default = "d_search_path_env")]
    pub search_path_env: Option<String>,

    /// Start from the parent process environment.
    #[serde(default = "d_true")]
    pub inherit_env: bool,

    /// Variables copied from the parent environment, only when present.
    #[serde(default = "d_passthrough_env")]
    pub passthrough_env: Vec<String>,

    /// Extra variables set on the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interpreter: d_interpreter(),
            script: d_script(),
            args: d_args(),
            working_dir: None,
            search_paths: d_search_paths(),
            search_path_env: d_search_path_env(),
            inherit_env: true,
            passthrough_env: d_passthrough_env(),
            env: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// The directory the server process runs in.
    pub fn effective_working_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.working_dir {
            return Some(dir.clone());
        }
        self.script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

/// Variables the tool server reads for registry and payment access.
pub const MASUMI_PASSTHROUGH_VARS: [&str; 5] = [
    "MASUMI_REGISTRY_TOKEN",
    "MASUMI_PAYMENT_TOKEN",
    "MASUMI_NETWORK",
    "MASUMI_REGISTRY_BASE_URL",
    "MASUMI_PAYMENT_BASE_URL",
];

fn d_interpreter() -> String {
    "python3".into()
}

fn d_script() -> PathBuf {
    PathBuf::from("../masumi-mcp-server/server.py")
}

fn d_args() -> Vec<String> {
    vec!["stdio".into()]
}

fn d_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("../masumi-mcp-server/")]
}

fn d_search_path_env() -> Option<String> {
    Some("PYTHONPATH".into())
}

fn d_true() -> bool {
    true
}

fn d_passthrough_env() -> Vec<String> {
    MASUMI_PASSTHROUGH_VARS.iter().map(|v| v.to_string()).collect()
}
