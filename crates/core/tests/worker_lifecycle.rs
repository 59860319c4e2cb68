//! Worker lifecycle integration tests.
//!
//! These drive the consumer loop end to end with in-memory doubles for the
//! cache and broker:
//! - Cache-aside behaviour across repeated inputs
//! - Ticket id injection on every published document
//! - Error documents and failed generations are never cached
//! - Every delivery is acknowledged exactly once
//! - Shutdown between deliveries

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::stream;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ticketrelay_core::{
    broker::{BrokerError, ConsumerLoop, IncomingMessage, TicketPublisher},
    config::CACHE_TTL,
    generation::HttpGenerationClient,
    testing::{fixtures, MemoryCache, MockAcker, MockGenerationClient, MockSink},
    GenerationClient, TicketProcessor,
};

/// Consumer loop wired to mocks.
struct TestHarness {
    consumer: ConsumerLoop,
    cache: Arc<MemoryCache>,
    sink: Arc<MockSink>,
}

impl TestHarness {
    fn with_generator(generator: Arc<dyn GenerationClient>) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let sink = Arc::new(MockSink::new());
        let processor = TicketProcessor::new(
            cache.clone(),
            generator,
            TicketPublisher::new(sink.clone()),
        );
        Self {
            consumer: ConsumerLoop::new(Arc::new(processor)),
            cache,
            sink,
        }
    }

    async fn run(&self, bodies: Vec<Vec<u8>>) -> Vec<MockAcker> {
        let ackers: Vec<MockAcker> = bodies.iter().map(|_| MockAcker::new()).collect();
        let deliveries: Vec<Result<IncomingMessage<MockAcker>, BrokerError>> = bodies
            .into_iter()
            .zip(ackers.iter().cloned())
            .enumerate()
            .map(|(i, (body, acker))| {
                Ok(IncomingMessage {
                    delivery_tag: i as u64 + 1,
                    redelivered: false,
                    body,
                    acker,
                })
            })
            .collect();

        self.consumer
            .run(stream::iter(deliveries), &CancellationToken::new())
            .await
            .expect("consumer run failed");
        ackers
    }
}

#[tokio::test]
async fn test_repeated_input_is_served_from_cache() {
    let generator = Arc::new(MockGenerationClient::new());
    generator.push_response(&fixtures::ticket_response("Stolen card"));
    let harness = TestHarness::with_generator(generator.clone());

    let ackers = harness
        .run(vec![
            fixtures::inbound_body("My card was stolen", "T-1"),
            fixtures::inbound_body("My card was stolen", "T-2"),
        ])
        .await;

    // One generation call for two identical inputs.
    assert_eq!(generator.call_count(), 1);

    let mut published = harness.sink.sent_json();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0]["ticketId"], "T-1");
    assert_eq!(published[1]["ticketId"], "T-2");

    // The republished document differs only by ticket id.
    for doc in &mut published {
        doc.as_object_mut().unwrap().remove("ticketId");
    }
    assert_eq!(published[0], published[1]);
    assert_eq!(published[0]["title"], "Stolen card");

    let cached: Value =
        serde_json::from_str(&harness.cache.raw("ticket:My card was stolen").unwrap()).unwrap();
    assert!(cached.get("ticketId").is_none());
    assert_eq!(cached["title"], "Stolen card");

    let writes = harness.cache.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].ttl, CACHE_TTL);

    assert!(ackers.iter().all(|a| a.ack_count() == 1));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_triggers_regeneration() {
    let generator = Arc::new(MockGenerationClient::new());
    let harness = TestHarness::with_generator(generator.clone());

    harness
        .run(vec![fixtures::inbound_body("Card declined abroad", "T-1")])
        .await;
    tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;
    harness
        .run(vec![fixtures::inbound_body("Card declined abroad", "T-2")])
        .await;

    assert_eq!(generator.call_count(), 2);
    assert_eq!(harness.cache.writes().len(), 2);
}

#[tokio::test]
async fn test_rejections_are_published_but_never_cached() {
    let generator = Arc::new(MockGenerationClient::new());
    generator.push_response(&fixtures::rejection_response());
    generator.push_response(&fixtures::rejection_response());
    let harness = TestHarness::with_generator(generator.clone());

    harness
        .run(vec![
            fixtures::inbound_body("Recommend a pizza place", "T-1"),
            fixtures::inbound_body("Recommend a pizza place", "T-2"),
        ])
        .await;

    // Not cached, so the second request generates again.
    assert_eq!(generator.call_count(), 2);
    assert!(harness.cache.is_empty());

    let published = harness.sink.sent_json();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0]["error"], "Non-banking query rejected");
    assert_eq!(published[1]["ticketId"], "T-2");
}

#[tokio::test]
async fn test_bad_messages_are_acked_and_dropped() {
    let generator = Arc::new(MockGenerationClient::new());
    let harness = TestHarness::with_generator(generator.clone());

    let ackers = harness
        .run(vec![
            b"not json".to_vec(),
            br#"{"ticketId":"T-1"}"#.to_vec(),
            br#"{"userInput":"help me"}"#.to_vec(),
            br#"[1,2,3]"#.to_vec(),
        ])
        .await;

    assert_eq!(generator.call_count(), 0);
    assert!(harness.sink.sent().is_empty());
    assert!(harness.cache.is_empty());
    assert!(ackers.iter().all(|a| a.ack_count() == 1));
}

#[tokio::test(start_paused = true)]
async fn test_generation_timeout_publishes_nothing() {
    let generator = Arc::new(MockGenerationClient::new());
    generator.set_delay(Duration::from_secs(45));
    let harness = TestHarness::with_generator(generator.clone());

    let ackers = harness
        .run(vec![fixtures::inbound_body("Transfer stuck", "T-1")])
        .await;

    assert!(harness.sink.sent().is_empty());
    assert!(harness.cache.is_empty());
    assert_eq!(ackers[0].ack_count(), 1);
}

#[tokio::test]
async fn test_publish_failure_still_acks_and_caches() {
    let generator = Arc::new(MockGenerationClient::new());
    let harness = TestHarness::with_generator(generator);
    harness.sink.fail_sends(true);

    let ackers = harness
        .run(vec![fixtures::inbound_body("App keeps crashing", "T-1")])
        .await;

    assert_eq!(ackers[0].ack_count(), 1);
    assert!(harness.cache.raw("ticket:App keeps crashing").is_some());
}

#[tokio::test]
async fn test_shutdown_after_in_flight_message() {
    let generator = Arc::new(MockGenerationClient::new());
    let harness = Arc::new(TestHarness::with_generator(generator));
    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded::<Result<IncomingMessage<MockAcker>, BrokerError>>();

    let run = {
        let harness = Arc::clone(&harness);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { harness.consumer.run(rx, &shutdown).await })
    };

    let acker = MockAcker::new();
    tx.unbounded_send(Ok(IncomingMessage {
        delivery_tag: 1,
        redelivered: true,
        body: fixtures::inbound_body("Lost my PIN", "T-1"),
        acker: acker.clone(),
    }))
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while acker.ack_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("delivery was never acked");

    shutdown.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("consumer did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(stats.received, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(harness.sink.sent().len(), 1);
    drop(tx);
}

#[tokio::test]
async fn test_http_generation_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(body_json(json!({
            "userInput": "Someone used my card online",
            "customerName": null,
            "customerId": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "Here is the ticket:\n{}\n",
            fixtures::ticket_response("Fraudulent charge")
        )))
        .expect(1)
        .mount(&server)
        .await;

    let generator = HttpGenerationClient::with_timeout(
        format!("{}/generate", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let harness = TestHarness::with_generator(Arc::new(generator));

    harness
        .run(vec![
            fixtures::inbound_body("Someone used my card online", "T-1"),
            fixtures::inbound_body("Someone used my card online", "T-2"),
        ])
        .await;

    let published = harness.sink.sent_json();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0]["title"], "Fraudulent charge");
    assert_eq!(published[0]["ticketId"], "T-1");
    assert_eq!(published[1]["ticketId"], "T-2");
}
