use std::sync::Arc;
use ticketrelay_core::{Config, MessageSink, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    sink: Arc<dyn MessageSink>,
}

impl AppState {
    pub fn new(config: Config, sink: Arc<dyn MessageSink>) -> Self {
        Self { config, sink }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Where accepted requests are published (the worker's inbound queue).
    pub fn sink(&self) -> &dyn MessageSink {
        self.sink.as_ref()
    }
}
