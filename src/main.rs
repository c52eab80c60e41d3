//! Arrakis Shards - demo entry point
//!
//! Brings up the configured shard range, logs every dispatch and lifecycle
//! diagnostic, and serves health/ready/metrics endpoints until shutdown.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use arrakis_shards::config::GatewayConfig;
use arrakis_shards::health::{self, AppState};
use arrakis_shards::metrics::GatewayMetrics;
use arrakis_shards::{ManagerConfig, ShardEvent, ShardManager, WebSocketConnector};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let gateway_config = GatewayConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("arrakis_shards={}", gateway_config.log_level).parse()?)
                .add_directive("tokio_tungstenite=warn".parse()?)
                .add_directive("twilight_http=info".parse()?),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        shard_count = %gateway_config.shard_count,
        shard_start = gateway_config.shard_start,
        shard_end = ?gateway_config.shard_end,
        encoding = gateway_config.encoding.name(),
        "Starting Arrakis shards"
    );

    let metrics = Arc::new(GatewayMetrics::install()?);
    info!("Prometheus metrics initialized");

    let info_source = twilight_http::Client::new(gateway_config.discord_token.clone());
    let (mut manager, mut events) = ShardManager::new(
        ManagerConfig {
            token: gateway_config.discord_token.clone(),
            shard_count: gateway_config.shard_count,
            codec: gateway_config.encoding,
        },
        Arc::new(info_source),
        Arc::new(WebSocketConnector::new()),
    );
    let mut diagnostics = manager.diagnostics();

    // Event consumer
    let consumer = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ShardEvent::Dispatch { shard_id, event_type, data }) => {
                        info!(shard_id, event_type = %event_type, data = %data, "Dispatch");
                    }
                    Some(ShardEvent::Payload { shard_id, payload }) => {
                        debug!(shard_id, op = ?payload.op, sequence = ?payload.s, "Payload");
                    }
                    None => break,
                },
                diagnostic = diagnostics.recv() => match diagnostic {
                    Ok(diagnostic) => debug!(shard_id = diagnostic.shard_id, "{}", diagnostic.lifecycle),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Diagnostics lagged"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    let app_state = AppState {
        shard_state: manager.state(),
        metrics: Some(Arc::clone(&metrics)),
    };
    let addr: SocketAddr = ([0, 0, 0, 0], gateway_config.http_port).into();
    info!(port = gateway_config.http_port, "Starting HTTP server");
    let http_server = axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        health::router(app_state),
    );

    let shards = async {
        manager
            .connect(gateway_config.shard_start, gateway_config.shard_end)
            .await?;
        info!(shards = ?manager.shard_ids(), "All shards ready");
        // shards keep running on their own tasks
        std::future::pending::<Result<(), arrakis_shards::GatewayError>>().await
    };

    tokio::select! {
        result = shards => {
            if let Err(e) = result {
                error!(error = %e, "Shard manager error");
            }
        }
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Shutting down shards...");
    manager.close().await;
    drop(manager);
    let _ = consumer.await;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
