//! ESC Server - HTTP inference service for environmental sound classification
//!
//! Loads a checkpoint once at startup and serves `POST /inference` with the
//! top-3 class predictions for a base64-encoded audio clip.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use esc_core::config::{default_config_path, load_config, ServerConfig};
use esc_core::{Classifier, SharedClassifier};

/// Environment variable overriding the checkpoint manifest path
const CHECKPOINT_ENV: &str = "ESC_CHECKPOINT";

#[derive(Debug, Parser)]
#[command(name = "esc-server")]
#[command(about = "Environmental sound classification inference server", long_about = None)]
struct Args {
    /// Config file (default: <config dir>/esc/server.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Checkpoint manifest, takes precedence over the config file and ESC_CHECKPOINT.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Listen port, overrides the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("esc-server starting up");

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let shared = Arc::new(SharedClassifier::new());
    if config.preload {
        preload(&shared, &config).await?;
    } else {
        log::info!("Lazy model loading: the first request loads {:?}", config.checkpoint);
    }

    let state = routes::AppState::new(
        Arc::clone(&shared),
        config.checkpoint.clone(),
        config.model.clone(),
    );
    let app = routes::router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    log::info!("esc-server stopped");
    Ok(())
}

/// Config file, then environment, then command line
///
/// A config file that exists but does not parse aborts startup.
fn resolve_config(args: &Args) -> Result<ServerConfig> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path("server.yaml"));
    let mut config: ServerConfig = load_config(&config_path)?;

    if let Some(path) = std::env::var_os(CHECKPOINT_ENV) {
        config.checkpoint = PathBuf::from(path);
    }
    if let Some(path) = &args.checkpoint {
        config.checkpoint = path.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    config.validate();
    Ok(config)
}

/// Load the classifier before accepting connections; failure is fatal
async fn preload(shared: &Arc<SharedClassifier>, config: &ServerConfig) -> Result<()> {
    let shared = Arc::clone(shared);
    let checkpoint = config.checkpoint.clone();
    let model_config = config.model.clone();

    let classifier = tokio::task::spawn_blocking(move || {
        shared.get_or_load(|| Classifier::load(&checkpoint, &model_config))
    })
    .await
    .context("Model load task panicked")?
    .with_context(|| format!("Failed to load classifier from {:?}", config.checkpoint))?;

    log::info!(
        "Model {:?} loaded on {} with {} classes",
        classifier.model_name(),
        classifier.device(),
        classifier.labels().len()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}
