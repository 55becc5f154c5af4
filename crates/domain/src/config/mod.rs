mod client;
mod server;

pub use client::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that overrides `server.script`.
pub const SERVER_PATH_ENV: &str = "MCP_SERVER_PATH";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Config {
    /// Parse a config from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Apply overrides taken from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(script) = lookup(SERVER_PATH_ENV).filter(|s| !s.is_empty()) {
            self.server.script = PathBuf::from(script);
        }

        // A value already set for the search path variable (`PYTHONPATH`
        // by default) wins over `server.search_paths`.
        if let Some(var) = &self.server.search_path_env {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                self.server.search_paths = std::env::split_paths(&value).collect();
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.interpreter.trim().is_empty() {
            errors.push(error("server.interpreter", "interpreter must not be empty"));
        }

        if self.server.script.as_os_str().is_empty() {
            errors.push(error("server.script", "script path must not be empty"));
        }

        if let Some(var) = &self.server.search_path_env {
            if !is_valid_env_name(var) {
                errors.push(error(
                    "server.search_path_env",
                    &format!("'{var}' is not a valid environment variable name"),
                ));
            }
            if self.server.search_paths.is_empty() {
                errors.push(warning(
                    "server.search_paths",
                    &format!("no search paths configured, {var} will be empty"),
                ));
            }
        }

        for name in self
            .server
            .passthrough_env
            .iter()
            .chain(self.server.env.keys())
        {
            if !is_valid_env_name(name) {
                errors.push(error(
                    "server.env",
                    &format!("'{name}' is not a valid environment variable name"),
                ));
            }
        }

        if self.client.name.trim().is_empty() {
            errors.push(error("client.name", "client name must not be empty"));
        }

        for (field, value) in [
            ("client.request_timeout_ms", self.client.request_timeout_ms),
            ("client.shutdown_timeout_ms", self.client.shutdown_timeout_ms),
        ] {
            if value == 0 {
                errors.push(error(field, "timeout must be greater than 0"));
            }
        }

        if self.client.startup_grace_ms == 0 {
            errors.push(warning(
                "client.startup_grace_ms",
                "a zero grace interval cannot detect servers that die on launch",
            ));
        }

        if self.defaults.network.trim().is_empty() {
            errors.push(error("defaults.network", "network must not be empty"));
        }

        errors
    }
}

fn error(field: &str, message: &str) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Error,
        field: field.into(),
        message: message.into(),
    }
}

fn warning(field: &str, message: &str) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Warning,
        field: field.into(),
        message: message.into(),
    }
}

fn is_valid_env_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=') && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let mut cfg = Config::default();
        cfg.client.request_timeout_ms = 0;
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "client.request_timeout_ms");
        assert_eq!(issues[0].severity, ConfigSeverity::Error);
    }

    #[test]
    fn bad_env_name_is_reported() {
        let mut cfg = Config::default();
        cfg.server.env.insert("A=B".into(), "x".into());
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.field == "server.env"));
    }

    #[test]
    fn empty_search_paths_warns() {
        let mut cfg = Config::default();
        cfg.server.search_paths.clear();
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
    }

    #[test]
    fn server_path_override_replaces_script() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(|key| {
            (key == SERVER_PATH_ENV).then(|| "/srv/masumi/server.py".to_string())
        });
        assert_eq!(cfg.server.script, PathBuf::from("/srv/masumi/server.py"));
    }

    #[test]
    fn search_path_override_replaces_search_paths() {
        let mut cfg = Config::default();
        let joined = std::env::join_paths(["/srv/masumi", "/opt/lib"])
            .unwrap()
            .into_string()
            .unwrap();
        cfg.apply_overrides_from(|key| (key == "PYTHONPATH").then(|| joined.clone()));
        assert_eq!(
            cfg.server.search_paths,
            vec![PathBuf::from("/srv/masumi"), PathBuf::from("/opt/lib")]
        );
        assert_eq!(cfg.server.script, Config::default().server.script);
    }

    #[test]
    fn search_path_override_follows_configured_variable() {
        let mut cfg = Config::default();
        cfg.server.search_path_env = Some("NODE_PATH".into());
        cfg.apply_overrides_from(|key| match key {
            "NODE_PATH" => Some("/srv/node".to_string()),
            "PYTHONPATH" => Some("/ignored".to_string()),
            _ => None,
        });
        assert_eq!(cfg.server.search_paths, vec![PathBuf::from("/srv/node")]);
    }

    #[test]
    fn empty_override_is_ignored() {
        let mut cfg = Config::default();
        let before = cfg.server.clone();
        cfg.apply_overrides_from(|_| Some(String::new()));
        assert_eq!(cfg.server.script, before.script);
        assert_eq!(cfg.server.search_paths, before.search_paths);
    }

    #[test]
    fn config_error_display() {
        let issue = error("client.name", "client name must not be empty");
        assert_eq!(
            issue.to_string(),
            "[ERROR] client.name: client name must not be empty"
        );
    }
}
