//! Ticket processing: cache-aside lookup, generation, publish, cache write.
//!
//! For each decoded request the [`TicketProcessor`]:
//! 1. derives a cache key from the user input and looks it up
//! 2. on a hit, stamps the cached document with the request's ticket id and publishes it
//! 3. on a miss, calls the generation service and extracts the JSON object from its reply
//! 4. stamps and publishes the generated document
//! 5. caches it (minus the ticket id) unless it is an error document
//!
//! No step raises; every path ends in a [`ProcessOutcome`] so the caller can
//! always acknowledge the delivery.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticketrelay_core::broker::TicketPublisher;
//! use ticketrelay_core::processor::TicketProcessor;
//!
//! let processor = TicketProcessor::new(cache, generator, TicketPublisher::new(sink))
//!     .with_key_strategy(config.cache.key_strategy)
//!     .with_generation_timeout(config.generation.timeout());
//!
//! let outcome = processor.process(&request).await;
//! tracing::info!(outcome = outcome.label(), "Processed");
//! ```

mod pipeline;
mod types;

pub use pipeline::TicketProcessor;
pub use types::ProcessOutcome;
