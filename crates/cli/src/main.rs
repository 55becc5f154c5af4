use clap::Parser;
use tracing_subscriber::EnvFilter;

use mb_cli::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.log_json);
    let mode = cli.output.mode();

    match cli.command {
        Command::Tool(tool_command) => {
            let (config, _) = mb_cli::cli::load_config()?;
            let ok = mb_cli::cli::tool::run(&config, tool_command, mode).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Status => {
            let (config, _) = mb_cli::cli::load_config()?;
            let ok = mb_cli::cli::status::run(&config, mode).await?;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Doctor => {
            let (config, config_path) = mb_cli::cli::load_config()?;
            let passed = mb_cli::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = mb_cli::cli::load_config()?;
            let valid = mb_cli::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = mb_cli::cli::load_config()?;
            mb_cli::cli::config::show(&config)
        }
        Command::Version => {
            println!("masumi-bridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize stderr-only tracing so diagnostic output does not pollute
/// stdout. Defaults to `warn`; `RUST_LOG` overrides.
fn init_cli_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
