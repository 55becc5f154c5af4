//! Environment construction for the spawned server process.
//!
//! The child gets a fully materialized environment (`env_clear` + the map
//! built here) so that what it sees does not depend on ordering quirks of
//! `Command::env`.
//!
//! Layers, lowest precedence first:
//! 1. the parent environment, when `inherit` is set;
//! 2. the caller-supplied base variables;
//! 3. the search roots, joined into `search_path_env`;
//! 4. the allow-listed variables, copied from the parent only if present.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::path::PathBuf;

use mb_domain::config::ServerConfig;

/// Everything needed to build the child environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSpec {
    pub inherit: bool,
    pub base: HashMap<String, String>,
    pub search_path_env: Option<String>,
    pub search_paths: Vec<PathBuf>,
    pub passthrough: Vec<String>,
}

impl EnvSpec {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            inherit: config.inherit_env,
            base: config.env.clone(),
            search_path_env: config.search_path_env.clone(),
            search_paths: config.search_paths.clone(),
            passthrough: config.passthrough_env.clone(),
        }
    }

    /// Build the environment from the current process environment.
    pub fn build(&self) -> BTreeMap<OsString, OsString> {
        self.build_from(std::env::vars_os())
    }

    /// Build the environment from an explicit parent environment.
    pub fn build_from(
        &self,
        parent: impl IntoIterator<Item = (OsString, OsString)>,
    ) -> BTreeMap<OsString, OsString> {
        let parent: BTreeMap<OsString, OsString> = parent.into_iter().collect();

        let mut env = if self.inherit {
            parent.clone()
        } else {
            BTreeMap::new()
        };

        for (key, value) in &self.base {
            env.insert(key.into(), value.into());
        }

        if let Some(var) = &self.search_path_env {
            if !self.search_paths.is_empty() {
                match std::env::join_paths(&self.search_paths) {
                    Ok(joined) => {
                        env.insert(var.into(), joined);
                    }
                    Err(e) => {
                        tracing::warn!(var = %var, error = %e, "search paths cannot be joined, leaving variable unset");
                    }
                }
            }
        }

        for name in &self.passthrough {
            if let Some(value) = parent.get(&OsString::from(name)) {
                env.insert(name.into(), value.clone());
            }
        }

        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(vars: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        vars.iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    fn get<'a>(env: &'a BTreeMap<OsString, OsString>, key: &str) -> Option<&'a str> {
        env.get(&OsString::from(key)).and_then(|v| v.to_str())
    }

    #[test]
    fn inherits_parent_environment() {
        let spec = EnvSpec {
            inherit: true,
            ..EnvSpec::default()
        };
        let env = spec.build_from(parent(&[("HOME", "/home/u")]));
        assert_eq!(get(&env, "HOME"), Some("/home/u"));
    }

    #[test]
    fn without_inherit_only_passthrough_survives() {
        let spec = EnvSpec {
            inherit: false,
            passthrough: vec!["MASUMI_NETWORK".into(), "MASUMI_PAYMENT_TOKEN".into()],
            ..EnvSpec::default()
        };
        let env = spec.build_from(parent(&[("HOME", "/home/u"), ("MASUMI_NETWORK", "Preprod")]));
        assert_eq!(get(&env, "HOME"), None);
        assert_eq!(get(&env, "MASUMI_NETWORK"), Some("Preprod"));
        // Absent allow-listed variables are not invented.
        assert!(!env.contains_key(&OsString::from("MASUMI_PAYMENT_TOKEN")));
    }

    #[test]
    fn search_paths_are_joined_into_variable() {
        let spec = EnvSpec {
            inherit: false,
            search_path_env: Some("PYTHONPATH".into()),
            search_paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            ..EnvSpec::default()
        };
        let env = spec.build_from(Vec::new());
        let expected = std::env::join_paths(["/a", "/b"]).unwrap();
        assert_eq!(env.get(&OsString::from("PYTHONPATH")), Some(&expected));
    }

    #[test]
    fn search_paths_override_inherited_value() {
        let spec = EnvSpec {
            inherit: true,
            search_path_env: Some("PYTHONPATH".into()),
            search_paths: vec![PathBuf::from("/srv/server")],
            ..EnvSpec::default()
        };
        let env = spec.build_from(parent(&[("PYTHONPATH", "/elsewhere")]));
        assert_eq!(get(&env, "PYTHONPATH"), Some("/srv/server"));
    }

    #[test]
    fn passthrough_beats_base() {
        let mut base = HashMap::new();
        base.insert("MASUMI_NETWORK".to_string(), "Mainnet".to_string());
        base.insert("LOG_LEVEL".to_string(), "debug".to_string());
        let spec = EnvSpec {
            inherit: false,
            base,
            passthrough: vec!["MASUMI_NETWORK".into()],
            ..EnvSpec::default()
        };
        let env = spec.build_from(parent(&[("MASUMI_NETWORK", "Preprod")]));
        assert_eq!(get(&env, "MASUMI_NETWORK"), Some("Preprod"));
        assert_eq!(get(&env, "LOG_LEVEL"), Some("debug"));
    }

    #[test]
    fn from_config_copies_every_field() {
        let config = ServerConfig::default();
        let spec = EnvSpec::from_config(&config);
        assert!(spec.inherit);
        assert_eq!(spec.search_path_env.as_deref(), Some("PYTHONPATH"));
        assert_eq!(spec.passthrough.len(), 5);
    }
}
