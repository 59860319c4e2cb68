use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticketrelay_core::{
    load_config, shutdown::install_signal_handler, validate_config, BrokerConnection, BrokerError,
    SanitizedConfig,
};
use ticketrelay_server::{create_router, AppState};

/// Environment variable naming an optional TOML config file.
const CONFIG_PATH_ENV: &str = "TICKETRELAY_CONFIG";

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    if let Some(path) = &config_path {
        info!("Loading configuration from {:?}", path);
    }
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    info!(config = %sanitized, "Configuration loaded");

    let shutdown = install_signal_handler();

    let broker = match BrokerConnection::connect(&config.broker, &shutdown).await {
        Ok(broker) => broker,
        Err(BrokerError::Cancelled) => {
            info!("Shutdown requested before the broker became reachable");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to set up broker"),
    };
    let sink = broker.sink(config.broker.incoming_destination());

    let addr = SocketAddr::new(config.ingress.host, config.ingress.port);
    let state = Arc::new(AppState::new(config, Arc::new(sink)));
    let app = create_router(state);

    info!("Starting ingress on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("Server error");

    info!("Ingress shutting down");
    broker.close().await;
    served
}
