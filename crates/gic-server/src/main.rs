//! GIC Server - Main entry point

use anyhow::Result;
use gic_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

use gic_server::{
    api, aws,
    config::Config,
    features::FeatureState,
    queue::SqsQueue,
    storage::S3Storage,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::for_component("gic-server")
        .with_filter_directives("gic_server=debug,tower_http=debug,aws_config=info")
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting GIC Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let sdk_config = aws::load_sdk_config(&config.aws).await;
    let store = S3Storage::new(&sdk_config, &config.storage);
    let queue = SqsQueue::new(&sdk_config, &config.queue);

    // A misprovisioned queue still accepts messages; report it and keep going
    match queue.check_attributes(&config.queue).await {
        Ok(mismatches) if mismatches.is_empty() => info!("Queue redrive settings verified"),
        Ok(mismatches) => {
            for mismatch in mismatches {
                warn!("Queue attribute mismatch: {}", mismatch);
            }
        },
        Err(e) => warn!("Could not verify queue attributes: {}", e),
    }

    let state = FeatureState {
        store: Arc::new(store),
        queue: Arc::new(queue),
        policy: Arc::new(config.upload.upload_policy()?),
        grant_expiry: config.upload.grant_expiry(),
        timeouts: config.timeouts,
    };

    let app = api::create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
