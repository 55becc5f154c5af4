//! Client configuration types, re-exported from `mb-domain`.
//!
//! The canonical definitions live in `mb_domain::config` so the CLI can
//! load and validate them without going through the client.

pub use mb_domain::config::{ClientConfig, Config, DefaultsConfig, ServerConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use crate::transport::LaunchSpec;
    use std::time::Duration;

    #[test]
    fn toml_settings_reach_the_launch_spec() {
        let raw = r#"
            [server]
            interpreter = "/usr/bin/python3.11"
            script = "/srv/masumi/server.py"

            [client]
            request_timeout_ms = 15000
            shutdown_timeout_ms = 1000
        "#;
        let config = Config::from_toml_str(raw).unwrap();

        let launch = LaunchSpec::from_config(&config);
        assert_eq!(launch.program, "/usr/bin/python3.11");
        assert_eq!(launch.args[0], "/srv/masumi/server.py");
        assert_eq!(launch.shutdown_timeout, Duration::from_millis(1000));

        let options = SessionOptions::from_config(&config.client);
        assert_eq!(options.request_timeout, Duration::from_millis(15000));
    }

    #[test]
    fn passthrough_allow_list_reaches_env_spec() {
        let config = Config::default();
        let launch = LaunchSpec::from_config(&config);
        assert!(launch
            .env
            .passthrough
            .iter()
            .any(|v| v == "MASUMI_REGISTRY_TOKEN"));
        assert_eq!(launch.env.search_path_env.as_deref(), Some("PYTHONPATH"));
    }
}
