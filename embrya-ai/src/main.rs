//! embrya-ai - Embryo Viability Assessment Microservice
//!
//! **Module Identity:**
//! - Name: embrya-ai
//! - Default port: 5731
//!
//! Loads frozen classifiers once at startup and serves predictions with a
//! full clinical report over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use embrya_common::{AuditSink, TracingAuditSink};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use embrya_ai::config::{ConfigOverrides, ServiceConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use embrya_ai::models::ModelStore;
use embrya_ai::{AppState, EmbryoAnalyzer};

/// Command-line arguments for embrya-ai
#[derive(Parser, Debug)]
#[command(name = "embrya-ai")]
#[command(about = "Embryo viability assessment microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "EMBRYA_AI_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "EMBRYA_AI_BIND")]
    bind: Option<String>,

    /// Directory holding the frozen classifier files
    #[arg(short, long, env = "EMBRYA_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Version tag recorded with every prediction
    #[arg(long, env = "EMBRYA_MODEL_VERSION")]
    model_version: Option<String>,

    /// Configuration file (overrides EMBRYA_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise the configured level is applied once the
    // config file has been read
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = embrya_common::config::load_resolved_config(
        args.config.as_deref(),
        CONFIG_ENV_VAR,
        CONFIG_FILE_NAME,
    )
    .context("Failed to load configuration")?;

    if !from_env {
        match EnvFilter::try_new(&toml_config.logging.level) {
            Ok(level) => filter_handle
                .reload(level)
                .context("Failed to apply configured log level")?,
            Err(e) => warn!(
                "Invalid logging.level '{}': {}; keeping 'info'",
                toml_config.logging.level, e
            ),
        }
    }

    info!(
        "Starting embrya-ai v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let config = ServiceConfig::resolve(
        ConfigOverrides {
            bind_address: args.bind,
            port: args.port,
            model_dir: args.model_dir,
            model_version: args.model_version,
        },
        &toml_config,
    )
    .context("Invalid configuration")?;

    // Loaded once; never reloaded while serving
    let registry = ModelStore::new(&config.model_dir).load(config.model_version.clone());
    if registry.is_empty() {
        warn!("Serving with zero models: every prediction will use the fallback result");
    } else {
        info!("Models: {}", registry.ids().join(", "));
    }

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let analyzer = Arc::new(EmbryoAnalyzer::new(Arc::new(registry), audit));
    let mut app = embrya_ai::build_router(AppState::new(analyzer));
    if let Some(cors) = embrya_ai::cors_layer(&config.cors_origins) {
        info!("CORS enabled for: {}", config.cors_origins.join(", "));
        app = app.layer(cors);
    }

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
