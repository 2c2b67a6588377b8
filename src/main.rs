use anyhow::{Context, Result};
use clap::Parser;
use docqa::{api, app, config, logging};
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "docqa",
    version,
    about = "Document ingestion and retrieval-augmented query service"
)]
struct Cli {
    /// Interface to bind (overrides HOST).
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Environment file loaded before reading configuration.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = config::load_dotenv(cli.env_file.as_deref());
    logging::init_tracing().context("failed to install tracing subscriber")?;
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(error) => tracing::warn!(error = %error, "Failed to read environment file"),
    }

    let mut config = config::Config::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(
        app = %config.app_name,
        version = %config.app_version,
        store = ?config.vector_store,
        embedding = ?config.embedding_provider,
        synthesis = ?config.synthesis_provider,
        "Starting service"
    );

    let state = app::build_state(config)
        .await
        .context("failed to initialize services")?;
    let router = api::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
