mod metrics;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticketrelay_core::{
    load_config, shutdown::install_signal_handler, validate_config, BrokerConnection, BrokerError,
    CacheStore, ConsumerLoop, GenerationClient, HttpGenerationClient, RedisCache, SanitizedConfig,
    TicketProcessor, TicketPublisher,
};

use metrics::CONSUMER_RUNNING;

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
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
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
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No config file set, using defaults and environment"),
    }
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    info!(config = %sanitized, "Configuration loaded");

    let shutdown = install_signal_handler();

    let status_server = config.worker.metrics_port.map(|port| {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(port, shutdown).await {
                error!(port, error = %e, "Status endpoint failed");
            }
        })
    });

    let broker = match BrokerConnection::connect(&config.broker, &shutdown).await {
        Ok(broker) => broker,
        Err(BrokerError::Cancelled) => {
            info!("Shutdown requested before the broker became reachable");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to set up broker"),
    };

    // A cache outage at startup is a deployment error; no retry.
    let cache = match RedisCache::connect(&config.cache).await {
        Ok(cache) => cache,
        Err(e) => {
            error!(url = %config.cache.url(), error = %e, "Cache unreachable at startup");
            broker.close().await;
            return Err(e).context("Failed to connect to cache");
        }
    };
    info!(url = %cache.url(), "Connected to cache");

    let cache: Arc<dyn CacheStore> = Arc::new(cache);
    let generator: Arc<dyn GenerationClient> = Arc::new(
        HttpGenerationClient::new(&config.generation)
            .context("Failed to create generation client")?,
    );
    info!(endpoint = generator.endpoint(), "Generation client ready");

    let publisher = TicketPublisher::new(Arc::new(
        broker.sink(config.broker.outgoing_destination()),
    ));
    info!(destination = %publisher.destination(), "Publishing structured tickets");

    let processor = TicketProcessor::new(cache, generator, publisher)
        .with_key_strategy(config.cache.key_strategy)
        .with_generation_timeout(config.generation.timeout());
    let consumer = ConsumerLoop::new(Arc::new(processor));

    let deliveries = broker
        .deliveries()
        .await
        .context("Failed to start consuming")?;

    CONSUMER_RUNNING.set(1);
    let result = consumer.run(deliveries, &shutdown).await;
    CONSUMER_RUNNING.set(0);

    broker.close().await;

    shutdown.cancel();
    if let Some(handle) = status_server {
        if let Err(e) = handle.await {
            warn!(error = %e, "Status endpoint task panicked");
        }
    }

    let stats = result.context("Consumer stopped with a broker error")?;
    info!(
        received = stats.received,
        processed = stats.processed,
        discarded = stats.discarded,
        "Worker stopped"
    );
    Ok(())
}
