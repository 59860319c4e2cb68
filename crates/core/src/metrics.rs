//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Consumer loop (deliveries by disposition, acknowledgement failures)
//! - Cache (lookups and writes)
//! - Generation service (requests, latency)
//! - Publisher (publishes by result)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// =============================================================================
// Consumer Metrics
// =============================================================================

/// Deliveries handled, by disposition.
pub static MESSAGES_CONSUMED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketrelay_messages_consumed_total",
            "Inbound deliveries handled by the consumer loop",
        ),
        &["outcome"], // "cache_hit", "generated", "rejected", "generation_failed", "invalid_response", "malformed", "incomplete"
    )
    .unwrap()
});

/// Acknowledgements the broker refused or that failed in transit.
pub static ACK_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketrelay_ack_failures_total",
        "Failed delivery acknowledgements",
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Cache lookups by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketrelay_cache_lookups_total", "Cache lookups"),
        &["result"], // "hit", "miss", "error", "corrupt"
    )
    .unwrap()
});

/// Cache writes by result.
pub static CACHE_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketrelay_cache_writes_total", "Cache writes"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Generation Metrics
// =============================================================================

/// Generation requests by result.
pub static GENERATION_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketrelay_generation_requests_total",
            "Requests to the generation service",
        ),
        &["result"], // "ok", "timeout", "http_error", "bad_status"
    )
    .unwrap()
});

/// Generation request duration in seconds.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketrelay_generation_duration_seconds",
            "Duration of generation service calls",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Publisher Metrics
// =============================================================================

/// Messages published, by result.
pub static PUBLISHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketrelay_publishes_total", "Messages published to the broker"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Consumer
        Box::new(MESSAGES_CONSUMED.clone()),
        Box::new(ACK_FAILURES.clone()),
        // Cache
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(CACHE_WRITES.clone()),
        // Generation
        Box::new(GENERATION_REQUESTS.clone()),
        Box::new(GENERATION_DURATION.clone()),
        // Publisher
        Box::new(PUBLISHES.clone()),
    ]
}

/// Encode a registry in the Prometheus text format.
pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
