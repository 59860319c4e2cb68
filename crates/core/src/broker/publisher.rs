//! Outbound ticket publishing.

use std::sync::Arc;
use tracing::{error, info};

use crate::metrics::PUBLISHES;
use crate::ticket::TicketDocument;

use super::MessageSink;

/// Serializes ticket documents and hands them to a [`MessageSink`].
///
/// Failures are logged and reported as `false`; they never propagate.
#[derive(Clone)]
pub struct TicketPublisher {
    sink: Arc<dyn MessageSink>,
}

impl TicketPublisher {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    pub fn destination(&self) -> String {
        self.sink.destination()
    }

    /// Publish one document. Returns whether the broker accepted it.
    pub async fn publish(&self, document: &TicketDocument) -> bool {
        let ticket_id = document.ticket_id().unwrap_or_default();

        let payload = match document.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                PUBLISHES.with_label_values(&["error"]).inc();
                error!(ticket_id = %ticket_id, error = %e, "Failed to serialize ticket document");
                return false;
            }
        };

        match self.sink.send(&payload).await {
            Ok(()) => {
                PUBLISHES.with_label_values(&["ok"]).inc();
                info!(
                    ticket_id = %ticket_id,
                    destination = %self.sink.destination(),
                    "Published ticket document"
                );
                true
            }
            Err(e) => {
                PUBLISHES.with_label_values(&["error"]).inc();
                error!(
                    ticket_id = %ticket_id,
                    destination = %self.sink.destination(),
                    error = %e,
                    "Failed to publish ticket document"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSink;
    use serde_json::Value;

    fn document() -> TicketDocument {
        TicketDocument::from_json_str(r#"{"title":"Stolen card","severity":"Critical"}"#)
            .unwrap()
            .with_ticket_id("T-7")
    }

    #[tokio::test]
    async fn test_publish_sends_serialized_document() {
        let sink = Arc::new(MockSink::new());
        let publisher = TicketPublisher::new(sink.clone());

        assert!(publisher.publish(&document()).await);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        let value: Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(value["ticketId"], "T-7");
        assert_eq!(value["title"], "Stolen card");
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported_not_raised() {
        let sink = Arc::new(MockSink::new());
        sink.fail_sends(true);
        let publisher = TicketPublisher::new(sink.clone());

        assert!(!publisher.publish(&document()).await);
        assert!(sink.sent().is_empty());
    }
}
