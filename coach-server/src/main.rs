//! coach-server - customer flag and lead tracking service
//!
//! Serves the REST API over a SQLite database in the root folder. On first
//! start with an empty database an administrator account is created and its
//! token is logged once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use coach_common::config::{CliOverrides, LoggingConfig, ServiceConfig, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coach_server::{build_router, db::coaches::ensure_admin, AppState};

/// Command-line arguments for coach-server
#[derive(Parser, Debug)]
#[command(name = "coach-server")]
#[command(about = "Customer flag and lead tracking service")]
#[command(version)]
struct Args {
    /// Folder holding the database
    #[arg(short, long, env = "COACH_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "COACH_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "COACH_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Log filter, e.g. "info" or "coach_server=debug"
    #[arg(long, env = "COACH_LOG_LEVEL")]
    log_level: Option<String>,

    /// TOML config file (default: ~/.config/coach/config.toml)
    #[arg(short, long, env = "COACH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = TomlConfig::load_or_default(args.config.as_deref());
    let config = ServiceConfig::resolve(
        CliOverrides {
            root_folder: args.root_folder,
            port: args.port,
            bind_address: args.bind_address,
            log_level: args.log_level,
        },
        toml,
    );

    let _log_guard = init_tracing(&config.logging)?;

    info!(
        "Starting coach-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config
        .ensure_root_folder()
        .context("Failed to create root folder")?;
    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = coach_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    if let Some(token) = ensure_admin(&pool).await? {
        warn!("Created administrator account; API token (shown once): {}", token);
    }

    let app = build_router(AppState::new(pool));

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("coach-server listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Console logging plus an optional log file
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// flushes the file writer when dropped.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log folder {}", dir.display()))?;
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {} has no file name", path.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

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
            Ok(mut stream) => {
                stream.recv().await;
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
