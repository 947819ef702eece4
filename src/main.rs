//! Storyvault server binary

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storyvault::api::{create_router, AppState};
use storyvault::config::{AppConfig, LogFormat};
use storyvault::mode::resolve_mode;
use storyvault::setup::provision_samples;
use storyvault::storage::{create_storage, SamplesDir, StorageBackend};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the samples directory and sample files
    Setup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Setup => setup(config).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let samples = SamplesDir::new(&config.storage.samples_dir);
    samples
        .ensure()
        .await
        .with_context(|| format!("failed to create {}", samples.path().display()))?;

    let store = build_store(&config).await;
    let state = AppState::new(&config, store);

    let startup_mode = resolve_mode(&config.mode_settings());
    tracing::info!(
        mode = %startup_mode,
        environment = ?config.mode.environment,
        samples_dir = %samples.path().display(),
        follow_env = config.mode.follow_env,
        "Resolved operating mode"
    );

    let router = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, service = %config.server.service_name, "Listening for HTTP traffic");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn setup(config: AppConfig) -> anyhow::Result<()> {
    let samples = SamplesDir::new(&config.storage.samples_dir);
    let report = provision_samples(&samples)
        .await
        .context("failed to provision samples directory")?;

    tracing::info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        samples_dir = %samples.path().display(),
        "Setup complete"
    );
    Ok(())
}

/// Build the cloud object store when its configuration allows.
///
/// Failures are logged; the server still starts and serves local test mode,
/// while cloud-mode requests answer with a configuration error.
async fn build_store(config: &AppConfig) -> Option<Arc<dyn StorageBackend>> {
    let storage_config = match config.storage_runtime() {
        Ok(Some(storage_config)) => storage_config,
        Ok(None) => {
            tracing::info!("Cloud storage configuration incomplete; object store disabled");
            return None;
        }
        Err(err) => {
            tracing::warn!(error = %err, "Invalid cloud storage configuration");
            return None;
        }
    };

    match create_storage(storage_config).await {
        Ok(store) => Some(Arc::from(store)),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to initialise object store");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, draining connections");
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("storyvault=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
