//! Mock broker endpoints: an outbound sink and a delivery acknowledger.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::broker::{Acknowledge, BrokerError, MessageSink};

/// [`MessageSink`] that records every payload it accepts.
#[derive(Debug, Default)]
pub struct MockSink {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent payloads decoded as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|payload| serde_json::from_slice(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl MessageSink for MockSink {
    fn destination(&self) -> String {
        "mock/outgoing".to_string()
    }

    async fn send(&self, payload: &[u8]) -> Result<(), BrokerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("simulated publish failure".into()));
        }
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// [`Acknowledge`] that counts acks. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct MockAcker {
    acks: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl MockAcker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_acks(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Ack attempts, successful or not.
    pub fn ack_count(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acknowledge for MockAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerError::Ack("simulated ack failure".into()));
        }
        Ok(())
    }
}
