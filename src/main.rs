use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use curator::cli::commands::{
    handle_config, handle_count, handle_delete, handle_get, handle_search, handle_setup,
    handle_similar, handle_status, handle_verify,
};
use curator::cli::{Cli, Commands};
use curator::models::{Config, OutputFormat};

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "curator=debug" } else { "curator=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let default_format = Config::load()
        .map(|c| c.search.default_format)
        .unwrap_or_default();
    let format = cli.format.unwrap_or(default_format);
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat, verbose: bool) -> Result<()> {
    match command {
        Commands::Status => handle_status(format, verbose).await,
        Commands::Setup { recreate } => handle_setup(recreate, format, verbose).await,
        Commands::Verify => handle_verify(format, verbose).await,
        Commands::Search(args) => handle_search(args, format, verbose).await,
        Commands::Similar(args) => handle_similar(args, format, verbose).await,
        Commands::Get { vector_id } => handle_get(vector_id, format, verbose).await,
        Commands::Delete { vector_ids } => handle_delete(vector_ids, format, verbose).await,
        Commands::Count => handle_count(format, verbose).await,
        Commands::Config(cmd) => handle_config(cmd, format, verbose).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
