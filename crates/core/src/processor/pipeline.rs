//! Ticket processor implementation.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::broker::TicketPublisher;
use crate::cache::{CacheKey, CacheStore};
use crate::config::{CacheKeyStrategy, GenerationConfig, CACHE_TTL};
use crate::generation::{GenerationClient, GenerationError, GenerationRequest};
use crate::metrics::{CACHE_LOOKUPS, CACHE_WRITES, GENERATION_DURATION, GENERATION_REQUESTS};
use crate::ticket::{InboundRequest, TicketDocument};

use super::types::ProcessOutcome;

/// Cache-aside ticket processor.
pub struct TicketProcessor {
    cache: Arc<dyn CacheStore>,
    generator: Arc<dyn GenerationClient>,
    publisher: TicketPublisher,
    key_strategy: CacheKeyStrategy,
    generation_timeout: Duration,
}

impl TicketProcessor {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        generator: Arc<dyn GenerationClient>,
        publisher: TicketPublisher,
    ) -> Self {
        Self {
            cache,
            generator,
            publisher,
            key_strategy: CacheKeyStrategy::default(),
            generation_timeout: GenerationConfig::default().timeout(),
        }
    }

    pub fn with_key_strategy(mut self, strategy: CacheKeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    /// Upper bound on one generation call, enforced on top of the client's own timeout.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Handle one request. Never fails; the outcome says what happened.
    pub async fn process(&self, request: &InboundRequest) -> ProcessOutcome {
        let key = CacheKey::derive(&request.user_input, self.key_strategy);

        if let Some(cached) = self.lookup(&key).await {
            let document = cached.with_ticket_id(&request.ticket_id);
            let published = self.publisher.publish(&document).await;
            info!(ticket_id = %request.ticket_id, published, "Served ticket from cache");
            return ProcessOutcome::CacheHit { published };
        }

        let text = match self.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                error!(ticket_id = %request.ticket_id, error = %e, "Generation failed, dropping request");
                return ProcessOutcome::GenerationFailed {
                    reason: e.to_string(),
                };
            }
        };

        let document = match TicketDocument::from_generation_text(&text) {
            Ok(document) => document.with_ticket_id(&request.ticket_id),
            Err(e) => {
                error!(
                    ticket_id = %request.ticket_id,
                    error = %e,
                    response = %text,
                    "Generation response held no usable JSON object"
                );
                return ProcessOutcome::InvalidResponse {
                    reason: e.to_string(),
                };
            }
        };

        let published = self.publisher.publish(&document).await;

        if document.is_error() {
            info!(ticket_id = %request.ticket_id, published, "Generation returned an error document, not caching");
            return ProcessOutcome::Rejected { published };
        }

        let cached = self.store(&key, &document).await;
        info!(ticket_id = %request.ticket_id, published, cached, "Generated ticket");
        ProcessOutcome::Generated { published, cached }
    }

    /// Read a cached document. Errors and undecodable entries count as a miss.
    async fn lookup(&self, key: &CacheKey) -> Option<TicketDocument> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match TicketDocument::from_json_str(&raw) {
                Ok(document) => {
                    CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                    debug!(cache_key = %key, "Cache hit");
                    Some(document)
                }
                Err(e) => {
                    CACHE_LOOKUPS.with_label_values(&["corrupt"]).inc();
                    warn!(cache_key = %key, error = %e, "Ignoring undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                debug!(cache_key = %key, "Cache miss");
                None
            }
            Err(e) => {
                CACHE_LOOKUPS.with_label_values(&["error"]).inc();
                warn!(cache_key = %key, cache = self.cache.name(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn generate(&self, request: &InboundRequest) -> Result<String, GenerationError> {
        let body = GenerationRequest::from(request);
        let started = Instant::now();

        debug!(
            ticket_id = %request.ticket_id,
            endpoint = self.generator.endpoint(),
            "Requesting ticket generation"
        );
        let result =
            match tokio::time::timeout(self.generation_timeout, self.generator.generate(&body)).await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(self.generation_timeout)),
            };

        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        GENERATION_REQUESTS.with_label_values(&[label]).inc();
        GENERATION_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    /// Write the document without its ticket id. Returns whether the write succeeded.
    async fn store(&self, key: &CacheKey, document: &TicketDocument) -> bool {
        let json = match document.cacheable().to_json_string() {
            Ok(json) => json,
            Err(e) => {
                CACHE_WRITES.with_label_values(&["error"]).inc();
                warn!(cache_key = %key, error = %e, "Failed to serialize document for cache");
                return false;
            }
        };

        match self.cache.set_with_ttl(key, &json, CACHE_TTL).await {
            Ok(()) => {
                CACHE_WRITES.with_label_values(&["ok"]).inc();
                debug!(cache_key = %key, ttl_secs = CACHE_TTL.as_secs(), "Cached ticket document");
                true
            }
            Err(e) => {
                CACHE_WRITES.with_label_values(&["error"]).inc();
                warn!(cache_key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }
}
