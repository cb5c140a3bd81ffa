use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use portico::cli::{self, Cli, Command};
use portico::config::LogFormat;
use portico::{Config, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::from(exitcode::CONFIG as u8);
        }
    };

    init_tracing(&config, cli.command.as_ref());

    if cli.command.as_ref().is_some_and(Command::serves_http) {
        if let Some(addr) = config.metrics_addr() {
            metrics::try_init_metrics(addr);
        }
        info!(mode = ?config.server.mode, "Configuration loaded");
    }

    match cli::run(cli.command, config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(failure) => {
            error!(code = failure.code, "{failure}");
            eprintln!("Error: {failure}");
            ExitCode::from(failure.code as u8)
        }
    }
}

/// Logs go to stderr so command output and the monitor table own stdout.
fn init_tracing(config: &Config, command: Option<&Command>) {
    let default_filter = match command {
        Some(Command::Monitor) => "warn",
        _ => config.default_log_filter(),
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match config.observability.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_thread_ids(true).init(),
    }
}
