//! trv-server - transcript review backend
//!
//! Exposes the evaluation rows over HTTP, streams media files and notifies
//! WebSocket clients every few seconds so they refetch.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trv_common::config::DEFAULT_BIND;
use trv_common::{ServerConfig, Variant};
use trv_server::notifier::Notifier;
use trv_server::{build_router, AppState};

/// Command-line arguments for trv-server
#[derive(Parser, Debug)]
#[command(name = "trv-server")]
#[command(about = "Transcript review backend")]
#[command(version)]
struct Args {
    /// Database connection string, e.g. sqlite://rows.db?mode=rwc
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Directory media files are served from
    #[arg(long, env = "MEDIA_DIR", default_value = "static")]
    media_dir: PathBuf,

    /// Service flavour: test or production
    #[arg(long, env = "TRV_VARIANT", default_value = "production")]
    variant: Variant,

    /// Rows table name (defaults to the variant's table)
    #[arg(long, env = "TRV_TABLE")]
    table: Option<String>,

    /// Address to listen on
    #[arg(long, env = "TRV_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Milliseconds between "update" broadcasts
    #[arg(long, env = "TRV_NOTIFY_INTERVAL_MS", default_value_t = 2000)]
    notify_interval_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.database_url, self.media_dir, self.variant)
            .with_bind(self.bind)
            .with_notify_interval(Duration::from_millis(self.notify_interval_ms));
        if let Some(table) = self.table {
            config = config.with_table(table);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trv_server=info,trv_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting trv-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = Args::parse().into_config();
    config.validate().context("Invalid configuration")?;

    info!("Variant: {}", config.variant);
    info!("Table: {}", config.table);
    info!("Media directory: {}", config.media_dir.display());
    if !config.media_dir.is_dir() {
        warn!(
            "Media directory {} does not exist; media requests will return 404",
            config.media_dir.display()
        );
    }

    let pool = trv_common::db::init_database(&config.database_url, &config.table, config.variant)
        .await
        .context("Failed to initialize database")?;

    let notifier = Arc::new(Notifier::new());
    let cancel = CancellationToken::new();
    let notifier_task = notifier.spawn(config.notify_interval, cancel.clone());

    let bind = config.bind;
    let state = AppState::new(pool.clone(), config, notifier.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("trv-server listening on http://{}", bind);

    let shutdown = {
        let notifier = notifier.clone();
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
            // Upgraded WebSocket connections are not tracked by the server;
            // closing their queues ends them.
            notifier.shutdown().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Err(e) = notifier_task.await {
        warn!("Notifier task ended abnormally: {}", e);
    }
    notifier.shutdown().await;
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["trv-server", "--database-url", "sqlite::memory:"]).unwrap();
        let config = args.into_config();

        assert_eq!(config.variant, Variant::Production);
        assert_eq!(config.table, "ml_training_finetune");
        assert_eq!(config.media_dir, PathBuf::from("static"));
        assert_eq!(config.notify_interval, Duration::from_secs(2));
        assert_eq!(config.bind.port(), 8000);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "trv-server",
            "--database-url",
            "sqlite://rows.db",
            "--variant",
            "test",
            "--table",
            "custom_rows",
            "--notify-interval-ms",
            "500",
            "--bind",
            "127.0.0.1:9000",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.variant, Variant::Test);
        assert_eq!(config.table, "custom_rows");
        assert_eq!(config.notify_interval, Duration::from_millis(500));
        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_args_reject_unknown_variant() {
        let result = Args::try_parse_from([
            "trv-server",
            "--database-url",
            "sqlite::memory:",
            "--variant",
            "staging",
        ]);
        assert!(result.is_err());
    }
}
