//! Broker connection lifecycle: connect with retry, declare topology, close.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::{
    acker::Acker,
    options::{
        BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
        ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BrokerConfig, Destination};

use super::consumer::IncomingMessage;
use super::{BrokerError, MessageSink};

/// AMQP delivery mode that makes a message survive a broker restart.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Call `connect` until it succeeds, sleeping `delay` between attempts.
///
/// There is no attempt limit. Each failure is logged. Returns
/// [`BrokerError::Cancelled`] if `shutdown` fires while waiting.
pub async fn retry_until_connected<T, E, F, Fut>(
    what: &str,
    delay: Duration,
    shutdown: &CancellationToken,
    mut connect: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match connect().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Connected to {} after retrying", what);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    "{} connection failed, retrying in {:?}", what, delay
                );
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return Err(BrokerError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// One broker connection plus the channel used for both consuming and publishing.
pub struct BrokerConnection {
    connection: Connection,
    channel: Channel,
    config: BrokerConfig,
}

impl BrokerConnection {
    /// Connect (retrying forever with fixed backoff), then declare the durable
    /// topology, set prefetch and enable publisher confirms.
    pub async fn connect(
        config: &BrokerConfig,
        shutdown: &CancellationToken,
    ) -> Result<Self, BrokerError> {
        info!(
            host = %config.host,
            port = config.port,
            vhost = %config.vhost,
            "Connecting to broker"
        );

        let uri = config.uri();
        let connection = retry_until_connected("broker", config.retry_delay(), shutdown, || {
            Connection::connect(&uri, ConnectionProperties::default())
        })
        .await?;
        info!("Connected to broker");

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        let broker = Self {
            connection,
            channel,
            config: config.clone(),
        };
        broker.declare_topology().await?;

        broker
            .channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        broker
            .channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        Ok(broker)
    }

    /// Declare the exchange (unless the default exchange is used) and both
    /// queues as durable, binding each queue with its routing key.
    async fn declare_topology(&self) -> Result<(), BrokerError> {
        let c = &self.config;
        let topology_err = |e: lapin::Error| BrokerError::Topology(e.to_string());

        if !c.uses_default_exchange() {
            self.channel
                .exchange_declare(
                    &c.exchange,
                    ExchangeKind::Direct,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(topology_err)?;
        }

        let queues = [
            (&c.incoming_queue, &c.incoming_routing_key),
            (&c.outgoing_queue, &c.outgoing_routing_key),
        ];
        for (queue, routing_key) in queues {
            self.channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(topology_err)?;

            if !c.uses_default_exchange() {
                self.channel
                    .queue_bind(
                        queue,
                        &c.exchange,
                        routing_key,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await
                    .map_err(topology_err)?;
            }
            debug!(queue = %queue, routing_key = %routing_key, "Declared durable queue");
        }

        info!(
            exchange = %c.exchange,
            incoming = %c.incoming_queue,
            outgoing = %c.outgoing_queue,
            "Broker topology declared"
        );
        Ok(())
    }

    /// Sink publishing to `destination` over this connection's channel.
    pub fn sink(&self, destination: Destination) -> AmqpSink {
        AmqpSink {
            channel: self.channel.clone(),
            destination,
        }
    }

    /// Start consuming the inbound queue with manual acknowledgement.
    pub async fn deliveries(
        &self,
    ) -> Result<impl Stream<Item = Result<IncomingMessage<Acker>, BrokerError>>, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                &self.config.incoming_queue,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;

        info!(queue = %self.config.incoming_queue, "Consuming inbound queue");

        Ok(consumer.map(|delivery| {
            delivery
                .map(IncomingMessage::from)
                .map_err(|e| BrokerError::Channel(e.to_string()))
        }))
    }

    /// Close the channel (if still open) and the connection.
    pub async fn close(self) {
        if self.channel.status().connected() {
            if let Err(e) = self.channel.close(200, "worker shutdown").await {
                warn!(error = %e, "Failed to close broker channel");
            }
        }
        if self.connection.status().connected() {
            if let Err(e) = self.connection.close(200, "worker shutdown").await {
                warn!(error = %e, "Failed to close broker connection");
            }
        }
        info!("Broker connection closed");
    }
}

/// Publishes persistent JSON messages to one exchange/routing key.
#[derive(Clone)]
pub struct AmqpSink {
    channel: Channel,
    destination: Destination,
}

#[async_trait]
impl MessageSink for AmqpSink {
    fn destination(&self) -> String {
        format!(
            "{}/{}",
            self.destination.exchange, self.destination.routing_key
        )
    }

    async fn send(&self, payload: &[u8]) -> Result<(), BrokerError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_content_type("application/json".into());

        let confirm = self
            .channel
            .basic_publish(
                &self.destination.exchange,
                &self.destination.routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        let confirmation = confirm
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        if confirmation.is_nack() {
            return Err(BrokerError::Publish(
                "broker did not confirm the message".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_connected_retries_with_fixed_delay() {
        let attempts = Arc::new(AtomicU32::new(0));
        let shutdown = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let counter = Arc::clone(&attempts);
        let result = retry_until_connected("test", Duration::from_secs(5), &shutdown, || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 4 {
                    Err(format!("refused #{n}"))
                } else {
                    Ok("connected")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // Three failures, three fixed 5s waits.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_connected_first_try() {
        let shutdown = CancellationToken::new();
        let result: Result<u8, BrokerError> =
            retry_until_connected("test", Duration::from_secs(5), &shutdown, || async {
                Ok::<_, String>(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_connected_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let result: Result<(), BrokerError> =
            retry_until_connected("test", Duration::from_secs(5), &shutdown, || async {
                Err::<(), _>("down")
            })
            .await;
        assert!(matches!(result, Err(BrokerError::Cancelled)));
    }
}
