//! Mock generation service client.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::generation::{GenerationClient, GenerationError, GenerationRequest};

use super::fixtures;

/// [`GenerationClient`] with scripted replies.
///
/// Replies queued with [`push_response`](Self::push_response) or
/// [`push_error`](Self::push_error) are returned in order; once the queue is
/// empty every call gets a generic ticket.
#[derive(Debug, Default)]
pub struct MockGenerationClient {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, body: &str) {
        self.replies.lock().unwrap().push_back(Ok(body.to_string()));
    }

    pub fn push_error(&self, error: GenerationError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Sleep this long before every reply.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    fn endpoint(&self) -> &str {
        "mock://generation"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(fixtures::ticket_response(&request.user_input)))
    }
}
