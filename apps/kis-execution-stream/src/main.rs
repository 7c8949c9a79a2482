//! KIS Execution Stream Binary
//!
//! Subscribes to the execution-report feed and logs every fill.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin kis-execution-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIS_APP_KEY`: application key
//! - `KIS_APP_SECRET`: application secret
//! - `KIS_HTS_ID`: subscriber key (HTS id)
//!
//! ## Optional
//! - `KIS_ENV`: PAPER | LIVE (default: PAPER)
//! - `KIS_WS_URL` / `KIS_REST_URL`: endpoint overrides
//! - `REDIS_URL`: approval key cache (default: redis://127.0.0.1:6379)
//! - `KIS_METRICS_PORT`: Prometheus port (default: 0, disabled)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use kis_execution_stream::infrastructure::telemetry;
use kis_execution_stream::{
    ApprovalKeyManager, ClientConfig, ExecutionEvent, ExecutionStreamClient,
    HttpApprovalKeyIssuer, RedisApprovalKeyStore, StreamConfig, WebSocketConnector, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting KIS execution stream");

    let config = StreamConfig::from_env()?;
    log_config(&config);

    if config.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        init_metrics(addr)?;
        tracing::info!(%addr, "Metrics endpoint listening");
    }

    let store = RedisApprovalKeyStore::connect(
        &config.cache.redis_url,
        config.cache.approval_key_cache_key.clone(),
    )
    .await?;
    let issuer = HttpApprovalKeyIssuer::new(&config.rest_base_url(), config.credentials.clone())?;
    let approval = ApprovalKeyManager::new(Arc::new(store), Arc::new(issuer));

    let connector = WebSocketConnector::new(config.connection.connect_timeout);

    let (execution_tx, execution_rx) = mpsc::channel::<ExecutionEvent>(1024);
    tokio::spawn(log_executions(execution_rx));

    let client = Arc::new(ExecutionStreamClient::new(
        ClientConfig::from_stream_config(&config),
        approval,
        Arc::new(connector),
        Arc::new(execution_tx),
    ));

    let mut feed = tokio::spawn(Arc::clone(&client).run());

    let outcome = tokio::select! {
        () = await_shutdown() => None,
        joined = &mut feed => Some(joined),
    };

    client.stop().await;

    let result = match outcome {
        Some(joined) => joined?,
        None => feed.await?,
    };
    if let Err(e) = &result {
        tracing::error!(error = %e, "Execution stream terminated");
    }

    tracing::info!("KIS execution stream stopped");
    result.map_err(Into::into)
}

async fn log_executions(mut rx: mpsc::Receiver<ExecutionEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::info!(
            stream_id = %event.stream_id,
            market = event.market.as_str(),
            symbol = %event.symbol,
            side = event.side.as_str(),
            order_id = event.order_id.as_deref().unwrap_or(""),
            price = ?event.filled_price,
            quantity = ?event.filled_quantity,
            notional = ?event.notional(),
            fill_time = ?event.fill_time,
            "Execution"
        );
    }
}

fn log_config(config: &StreamConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        subscriber = %config.subscriber_key,
        max_reconnect_attempts = config.connection.max_reconnect_attempts,
        reconnect_jitter = config.connection.reconnect_jitter,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        websocket_url = %config.websocket_url(),
        rest_url = %config.rest_base_url(),
        cache_key = %config.cache.approval_key_cache_key,
        "Endpoints"
    );
}

fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
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
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
