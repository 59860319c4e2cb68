//! In-memory cache store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::{CacheError, CacheKey, CacheStore};

/// A recorded `set_with_ttl` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, (String, Option<Instant>)>,
    writes: Vec<RecordedWrite>,
    fail_reads: bool,
    fail_writes: bool,
}

/// [`CacheStore`] backed by a map, with expiry measured on the tokio clock
/// so paused-time tests can step past a TTL.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<State>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry that never expires. Not recorded as a write.
    pub fn insert(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(key.to_string(), (value.to_string(), None));
    }

    /// Current value for `key`, ignoring expiry.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .entries
            .get(key)
            .map(|(value, _)| value.clone())
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(CacheError::Command("simulated read failure".into()));
        }

        let expired = matches!(
            state.entries.get(key.as_str()),
            Some((_, Some(deadline))) if Instant::now() >= *deadline
        );
        if expired {
            state.entries.remove(key.as_str());
            return Ok(None);
        }
        Ok(state.entries.get(key.as_str()).map(|(value, _)| value.clone()))
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(CacheError::Command("simulated write failure".into()));
        }

        state.entries.insert(
            key.as_str().to_string(),
            (value.to_string(), Some(Instant::now() + ttl)),
        );
        state.writes.push(RecordedWrite {
            key: key.as_str().to_string(),
            value: value.to_string(),
            ttl,
        });
        Ok(())
    }
}
