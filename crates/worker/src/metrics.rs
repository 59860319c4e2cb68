//! Prometheus registry for the worker process.

use once_cell::sync::Lazy;
use prometheus::{IntGauge, Registry};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// 1 while the consumer loop is attached to the broker.
pub static CONSUMER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketrelay_worker_consumer_running",
        "Whether the worker is consuming the inbound queue",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONSUMER_RUNNING.clone()))
        .unwrap();

    for metric in ticketrelay_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    ticketrelay_core::metrics::encode(&REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_includes_core_metrics() {
        ticketrelay_core::metrics::PUBLISHES
            .with_label_values(&["ok"])
            .inc();
        CONSUMER_RUNNING.set(1);

        let text = encode_metrics().unwrap();
        assert!(text.contains("ticketrelay_publishes_total"));
        assert!(text.contains("ticketrelay_worker_consumer_running 1"));
    }
}
