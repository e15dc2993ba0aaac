//! lighttable-server - media review service entry point
//!
//! Configuration resolves CLI args, then `LIGHTTABLE_*` environment, then
//! the TOML config file, then compiled defaults.

use anyhow::{Context, Result};
use clap::Parser;
use lighttable_common::config::{self, CompiledDefaults, ConfigOverrides, Settings};
use lighttable_common::files::FileTree;
use lighttable_common::metadata::MetadataStore;
use lighttable_server::transcode::FfmpegEncoder;
use lighttable_server::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for lighttable-server
#[derive(Parser, Debug)]
#[command(name = "lighttable-server")]
#[command(about = "Collaborative media review server")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "LIGHTTABLE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the reviewed media
    #[arg(long, env = "LIGHTTABLE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON user directory
    #[arg(long, env = "LIGHTTABLE_USERS_FILE")]
    users_file: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "LIGHTTABLE_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LIGHTTABLE_PORT")]
    port: Option<u16>,

    /// Session token signing secret
    #[arg(long, env = "LIGHTTABLE_SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// ffmpeg binary
    #[arg(long, env = "LIGHTTABLE_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// ffprobe binary
    #[arg(long, env = "LIGHTTABLE_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LIGHTTABLE_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: self.data_dir.clone(),
            users_file: self.users_file.clone(),
            bind: self.bind.clone(),
            port: self.port,
            session_secret: self.session_secret.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (file, config_path) =
        config::load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let settings = Settings::resolve(args.overrides(), file, CompiledDefaults::default());

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting Lighttable ({}) v{} [{}] built {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Data directory: {}", settings.data_dir.display());
    info!("Users file: {}", settings.users_file.display());

    let session_secret = match settings.session_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("No session secret configured; generated a random one, sessions end on restart");
            config::generate_session_secret()
        }
    };

    FileTree::new(MetadataStore::new(&settings.data_dir))
        .ensure_root()
        .await
        .context("Failed to create data directory")?;

    let encoder = Arc::new(FfmpegEncoder::new(&settings.encoder));
    let state = AppState::new(&settings, &session_secret, encoder);
    let app = build_router(state);

    let addr = settings.listen_addr();
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
