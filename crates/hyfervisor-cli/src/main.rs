//! Hyfervisor CLI - install and run macOS virtual machines.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.bundle.clone())?;

    // Logs go to stderr; stdout carries command output and progress lines.
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| log_directive(cli.debug, &config.logging.level).into()),
    );
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    match cli.command {
        Commands::Install(args) => commands::install::execute(args, config).await,
        Commands::Run => commands::run::execute(config).await,
        Commands::Status => commands::status::execute(&config),
        Commands::Info => commands::info::execute(),
        Commands::Version => commands::version::execute(),
    }
}

/// Default filter directive when `RUST_LOG` is unset.
fn log_directive(debug: bool, level: &str) -> String {
    if debug {
        "hyfervisor=debug".to_string()
    } else {
        format!("hyfervisor={}", level)
    }
}

#[cfg(test)]
mod tests {
    use super::log_directive;

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(false, "info"), "hyfervisor=info");
        assert_eq!(log_directive(false, "warn"), "hyfervisor=warn");
        assert_eq!(log_directive(true, "warn"), "hyfervisor=debug");
    }
}
