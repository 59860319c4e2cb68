//! Consumer loop: decode, process, acknowledge.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::{acker::Acker, message::Delivery, options::BasicAckOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::metrics::{ACK_FAILURES, MESSAGES_CONSUMED};
use crate::processor::{ProcessOutcome, TicketProcessor};
use crate::ticket::{InboundRequest, MessageError};

use super::BrokerError;

/// Positive acknowledgement of one delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl Acknowledge for Acker {
    async fn ack(&self) -> Result<(), BrokerError> {
        Acker::ack(self, BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}

/// A delivery taken off the inbound queue.
#[derive(Debug)]
pub struct IncomingMessage<A> {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub acker: A,
}

impl From<Delivery> for IncomingMessage<Acker> {
    fn from(delivery: Delivery) -> Self {
        Self {
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            body: delivery.data,
            acker: delivery.acker,
        }
    }
}

/// What happened to a delivery before it was acknowledged.
#[derive(Debug)]
pub enum Disposition {
    /// Decoded and run through the processor.
    Processed(ProcessOutcome),
    /// Rejected at decode time and dropped.
    Discarded(MessageError),
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processed(outcome) => outcome.label(),
            Self::Discarded(e) if e.is_malformed() => "malformed",
            Self::Discarded(_) => "incomplete",
        }
    }
}

/// Counters for one consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub processed: u64,
    pub discarded: u64,
    pub ack_failures: u64,
}

/// Drives deliveries through the processor one at a time.
///
/// Every delivery is acknowledged exactly once after handling, whatever
/// the outcome. Nothing is requeued.
pub struct ConsumerLoop {
    processor: Arc<TicketProcessor>,
}

impl ConsumerLoop {
    pub fn new(processor: Arc<TicketProcessor>) -> Self {
        Self { processor }
    }

    /// Decode and process one message body.
    pub async fn handle(&self, body: &[u8]) -> Disposition {
        let request = match InboundRequest::decode(body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, bytes = body.len(), "Discarding inbound message");
                return Disposition::Discarded(e);
            }
        };

        info!(ticket_id = %request.ticket_id, "Received ticket request");
        Disposition::Processed(self.processor.process(&request).await)
    }

    /// Consume `deliveries` until the stream ends or `shutdown` fires.
    ///
    /// Shutdown is only observed between deliveries, so a message already
    /// being handled is finished and acknowledged first. A stream error
    /// ends the run with that error.
    pub async fn run<S, A>(
        &self,
        deliveries: S,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerStats, BrokerError>
    where
        S: Stream<Item = Result<IncomingMessage<A>, BrokerError>>,
        A: Acknowledge,
    {
        tokio::pin!(deliveries);
        let mut stats = ConsumerStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, consumer stopping");
                    break;
                }
                next = deliveries.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!(error = %e, "Delivery stream failed");
                    return Err(e);
                }
                None => {
                    info!("Delivery stream closed");
                    break;
                }
            };

            stats.received += 1;
            let span = info_span!(
                "delivery",
                tag = message.delivery_tag,
                redelivered = message.redelivered
            );

            let disposition = self.handle(&message.body).instrument(span.clone()).await;
            match &disposition {
                Disposition::Processed(_) => stats.processed += 1,
                Disposition::Discarded(_) => stats.discarded += 1,
            }
            MESSAGES_CONSUMED
                .with_label_values(&[disposition.label()])
                .inc();

            if let Err(e) = message.acker.ack().instrument(span).await {
                stats.ack_failures += 1;
                ACK_FAILURES.inc();
                warn!(tag = message.delivery_tag, error = %e, "Failed to acknowledge delivery");
            }
        }

        info!(
            received = stats.received,
            processed = stats.processed,
            discarded = stats.discarded,
            ack_failures = stats.ack_failures,
            "Consumer stopped"
        );
        Ok(stats)
    }
}
