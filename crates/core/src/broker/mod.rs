//! Message broker plumbing (AMQP 0.9.1).
//!
//! # Architecture
//!
//! ```text
//! BrokerConnection ──┬── consume(incoming_queue) ──► ConsumerLoop ──► TicketProcessor
//!  (retry forever,   │                                   │ ack after every delivery
//!   durable topology)│                                   ▼
//!                    └── sink(outgoing) ◄── TicketPublisher (persistent, confirmed)
//! ```
//!
//! One connection and one channel are owned by one consumption loop. A worker
//! that wants more throughput runs more processes, each with its own
//! connection, competing on the same durable queue.

mod connection;
mod consumer;
mod publisher;

pub use connection::{retry_until_connected, AmqpSink, BrokerConnection};
pub use consumer::{
    Acknowledge, ConsumerLoop, ConsumerStats, Disposition, IncomingMessage,
};
pub use publisher::TicketPublisher;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Failed to declare topology: {0}")]
    Topology(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    #[error("Shutdown requested")]
    Cancelled,
}

/// Destination for serialized messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Human-readable destination, e.g. `exchange/routing_key`.
    fn destination(&self) -> String;

    /// Publish one payload with persistent delivery.
    async fn send(&self, payload: &[u8]) -> Result<(), BrokerError>;
}
