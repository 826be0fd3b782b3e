//! itrack-api: REST API server for the itrack issue tracker
//!
//! Serves users, issues, labels, comments, CSV import and reports over HTTP.

mod error;
mod routes;

use anyhow::Context;
use clap::Parser;
use itrack_core::{Config, Tracker};
use routes::AppState;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "itrack-api", version, about = "REST API server for the itrack issue tracker")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "ITRACK_CONFIG", default_value = "itrack.toml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, env = "ITRACK_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "ITRACK_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long, env = "ITRACK_DATABASE")]
    database: Option<PathBuf>,

    /// Print a commented default config and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Flags win over values from the config file
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.print_config {
        print!("{}", Config::default_with_comments());
        return Ok(());
    }

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    cli.apply(&mut config);
    init_tracing(&config.log.filter);

    let tracker = Tracker::open(&config.database).with_context(|| {
        format!("Failed to open database {}", config.database.path.display())
    })?;
    tracing::info!(path = %config.database.path.display(), "database ready");

    let state = Arc::new(AppState::new(tracker, config.import.max_upload_bytes));
    let app = routes::router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Starting itrack-api on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "itrack-api",
            "--port",
            "9100",
            "--database",
            "/tmp/itrack-test.db",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path, PathBuf::from("/tmp/itrack-test.db"));
    }
}
