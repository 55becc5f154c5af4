use mb_domain::config::{Config, ConfigError, ConfigSeverity};

/// Validation issues of one config, errors first.
pub struct IssueSummary {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<ConfigError>,
}

impl IssueSummary {
    pub fn of(config: &Config) -> Self {
        let (errors, warnings) = config
            .validate()
            .into_iter()
            .partition(|issue| issue.severity == ConfigSeverity::Error);
        Self { errors, warnings }
    }

    /// Warnings alone do not make a config invalid.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn issues(&self) -> impl Iterator<Item = &ConfigError> {
        self.errors.iter().chain(&self.warnings)
    }

    pub fn describe(&self) -> String {
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => "no issues".into(),
            (0, w) => format!("{w} warning(s)"),
            (e, w) => format!("{e} error(s), {w} warning(s)"),
        }
    }
}

/// `config validate`: print each issue and a one-line verdict.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let summary = IssueSummary::of(config);
    for issue in summary.issues() {
        println!("{issue}");
    }

    let verdict = if summary.is_valid() { "valid" } else { "invalid" };
    println!("{config_path}: {verdict} ({})", summary.describe());
    summary.is_valid()
}

/// Dump the resolved config (with all defaults and overrides applied) as
/// TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
    print!("{output}");
    Ok(())
}
