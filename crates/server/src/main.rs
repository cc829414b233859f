//! Scratcher daemon binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use scratcher_core::config::AppConfig;
use scratcher_metadata::MetadataStore;
use scratcher_poller::{PollOrchestrator, Scheduler};
use scratcher_server::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Scratcher - aggregates metadata changes across active scratch orgs
#[derive(Parser, Debug)]
#[command(name = "scratcherd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SCRATCHER_CONFIG",
        default_value = "config/scratcher.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Serve the read API and poll on a schedule (default)
    #[default]
    Serve,
    /// Run a single poll cycle and exit
    Poll,
    /// Create the schema and verify store connectivity
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Scratcher v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config.validate().context("invalid configuration")?;

    // The store must be reachable before anything else starts.
    let metadata = scratcher_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize change store")?;
    metadata
        .health_check()
        .await
        .context("change store health check failed")?;
    tracing::info!("Change store initialized");

    let result = match args.command.unwrap_or_default() {
        Command::Serve => serve(config, metadata.clone()).await,
        Command::Poll => poll_once(&config, metadata.clone()).await,
        Command::InitDb => {
            tracing::info!("Schema is up to date");
            Ok(())
        }
    };

    metadata.close().await;
    tracing::info!("Change store closed");
    result
}

/// Load configuration from an optional TOML file merged with
/// `SCRATCHER_`-prefixed environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("SCRATCHER_") && key != "SCRATCHER_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: scratcherd --config /path/to/scratcher.toml\n  \
             2. Environment variables: SCRATCHER_DEVHUB__USERNAME=hub@example.com \
             SCRATCHER_DEVHUB__PASSWORD=... scratcherd\n\n\
             See config/scratcher.example.toml for example configuration.\n\
             Set SCRATCHER_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("SCRATCHER_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn poll_once(config: &AppConfig, metadata: Arc<dyn MetadataStore>) -> Result<()> {
    scratcher_poller::metrics::register_metrics();
    let orchestrator =
        PollOrchestrator::from_config(config, metadata).context("failed to build poller")?;
    let summary = orchestrator
        .run_cycle()
        .await
        .context("poll cycle failed")?;

    tracing::info!(
        seen = summary.sandboxes_seen,
        polled = summary.sandboxes_polled,
        failed = summary.sandboxes_failed,
        changes = summary.changes_written,
        duration_ms = summary.duration().as_millis() as u64,
        "Poll complete"
    );
    Ok(())
}

async fn serve(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Result<()> {
    scratcher_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let orchestrator = PollOrchestrator::from_config(&config, metadata.clone())
        .context("failed to build poller")?;
    let scheduler = Scheduler::new(
        Arc::new(orchestrator),
        config.poll.interval(),
        config.poll.run_on_startup,
    );
    let driver = scheduler.start();

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, metadata, scheduler.clone());
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, waiting for in-flight poll cycle");
    scheduler.shutdown();
    if let Err(e) = driver.await {
        tracing::warn!(error = %e, "Poll scheduler task ended abnormally");
    }
    scheduler.wait_idle().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
