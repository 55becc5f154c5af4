use std::path::Path;

use mb_domain::config::Config;
use mb_mcp_client::{Session, SessionState};

use super::config::IssueSummary;

/// Outcome of one diagnostic check.
struct Check {
    name: String,
    passed: bool,
    detail: String,
}

impl Check {
    fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

/// Run every diagnostic check, printing one PASS/FAIL line each.
///
/// Returns `Ok(false)` when any check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("masumi-bridge doctor\n");

    let mut checks = vec![check_config_file(config_path)];

    let summary = IssueSummary::of(config);
    checks.push(Check::new(
        "Config validation",
        summary.is_valid(),
        summary.describe(),
    ));
    print_checks(&checks);
    for issue in summary.issues() {
        println!("      {issue}");
    }

    let mut rest = vec![check_interpreter(config), check_script(config)];
    rest.extend(check_passthrough_env(config));
    rest.push(check_handshake(config).await);
    print_checks(&rest);
    checks.extend(rest);

    let failed = checks.iter().filter(|c| !c.passed).count();
    println!();
    if failed == 0 {
        println!("All {} checks passed.", checks.len());
    } else {
        println!("{failed} of {} checks failed.", checks.len());
    }

    Ok(failed == 0)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str) -> Check {
    if Path::new(config_path).exists() {
        Check::new("Config file", true, config_path)
    } else {
        Check::new(
            "Config file",
            false,
            format!("{config_path} missing, built-in defaults in use"),
        )
    }
}

fn check_interpreter(config: &Config) -> Check {
    let interpreter = &config.server.interpreter;
    match find_program(interpreter) {
        Some(path) => Check::new("Interpreter found", true, path),
        None => Check::new(
            "Interpreter found",
            false,
            format!("{interpreter} (not found)"),
        ),
    }
}

fn check_script(config: &Config) -> Check {
    let script = &config.server.script;
    let ok = script.is_file();
    let detail = if ok {
        script.display().to_string()
    } else {
        format!("{} (missing)", script.display())
    };
    Check::new("Server script exists", ok, detail)
}

fn check_passthrough_env(config: &Config) -> Vec<Check> {
    config
        .server
        .passthrough_env
        .iter()
        .map(|name| {
            let value = std::env::var(name).ok().filter(|v| !v.is_empty());
            let required = is_secret(name);
            let detail = match &value {
                Some(v) if required => format!("set ({})", mask_secret(v)),
                Some(v) => format!("set ({v})"),
                None if required => "not set".into(),
                None => "not set (server default)".into(),
            };
            Check::new(format!("Env {name}"), value.is_some() || !required, detail)
        })
        .collect()
}

async fn check_handshake(config: &Config) -> Check {
    let mut session = Session::from_config(config);
    let outcome = session.start().await;
    let detail = match &outcome {
        Ok(()) => {
            let info = session.server_info().cloned().unwrap_or_default();
            if info.name.is_empty() {
                "server answered initialize".to_string()
            } else {
                format!("{} {}", info.name, info.version)
            }
        }
        Err(e) => format!("[{}] {e}", e.kind()),
    };
    let ok = outcome.is_ok() && session.state() == SessionState::Ready;
    session.stop().await;

    Check::new("MCP handshake", ok, detail)
}

// ── Helpers ───────────────────────────────────────────────────────────

fn is_secret(name: &str) -> bool {
    name.ends_with("_TOKEN") || name.ends_with("_KEY")
}

/// Show only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return "****".into();
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("****{tail}")
}

/// Resolve `program` the way a spawn would: paths are checked directly,
/// bare names are searched on `PATH`.
fn find_program(program: &str) -> Option<String> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.display().to_string());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .map(|candidate| candidate.display().to_string())
}

fn print_checks(checks: &[Check]) {
    for check in checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{status}] {}: {}", check.name, check.detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_keep_last_four_chars() {
        assert_eq!(mask_secret("abcdef123456"), "****3456");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("ééééé"), "****éééé");
    }

    #[test]
    fn token_variables_are_secret() {
        assert!(is_secret("MASUMI_REGISTRY_TOKEN"));
        assert!(!is_secret("MASUMI_NETWORK"));
    }

    #[test]
    fn missing_config_file_fails_with_defaults_note() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masumi.toml");
        let check = check_config_file(&path.display().to_string());
        assert!(!check.passed);
        assert!(check.detail.ends_with("built-in defaults in use"));

        std::fs::write(&path, "").unwrap();
        assert!(check_config_file(&path.display().to_string()).passed);
    }

    #[test]
    fn optional_passthrough_variables_never_fail() {
        let mut config = Config::default();
        config.server.passthrough_env = vec!["MB_DOCTOR_TEST_UNSET_NETWORK".into()];
        let checks = check_passthrough_env(&config);
        assert_eq!(checks.len(), 1);
        assert!(checks[0].passed);
        assert_eq!(checks[0].detail, "not set (server default)");
    }

    #[cfg(unix)]
    #[test]
    fn finds_programs_by_path_and_name() {
        assert!(find_program("/bin/sh").is_some());
        assert!(find_program("sh").is_some());
        assert!(find_program("/definitely/not/here").is_none());
    }
}
