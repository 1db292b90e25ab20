use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::core::{LowLevelClient, Prompt};
use crate::error::AIError;

/// One scripted completion-service reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Raw model text, returned verbatim
    Text(String),
    /// Serialized and returned as text
    Json(Value),
    /// Fails the call with [`AIError::Mock`]
    Error(String),
}

/// Controls a [`MockClient`] from the test side.
///
/// Replies come from the first route whose marker occurs in the prompt, else from the
/// shared queue. An exhausted queue fails the call.
#[derive(Debug, Default)]
pub struct MockHandle {
    queue: Mutex<VecDeque<MockResponse>>,
    routes: Mutex<Vec<(String, VecDeque<MockResponse>)>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHandle {
    pub fn push(&self, response: MockResponse) {
        lock(&self.queue).push_back(response);
    }

    pub fn push_many(&self, responses: impl IntoIterator<Item = MockResponse>) {
        lock(&self.queue).extend(responses);
    }

    /// Reply with `responses` to prompts whose text contains `marker`.
    pub fn route(&self, marker: impl Into<String>, responses: impl IntoIterator<Item = MockResponse>) {
        lock(&self.routes).push((marker.into(), responses.into_iter().collect()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received so far, in arrival order.
    pub fn prompts(&self) -> Vec<Prompt> {
        lock(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.queue).len() + lock(&self.routes).iter().map(|(_, q)| q.len()).sum::<usize>()
    }

    fn next_for(&self, prompt: &Prompt) -> Option<MockResponse> {
        let routed = lock(&self.routes)
            .iter_mut()
            .find(|(marker, _)| prompt.system.contains(marker.as_str()) || prompt.user.contains(marker.as_str()))
            .map(|(marker, queue)| {
                debug!(marker = %marker, "Routing mock prompt");
                queue.pop_front()
            });
        match routed {
            Some(response) => response,
            None => lock(&self.queue).pop_front(),
        }
    }
}

/// Scripted completion service for tests and offline runs.
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
    configured: bool,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone(), configured: true }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        handle.push_many(responses);
        (client, handle)
    }

    /// A client that reports a missing credential, as a network client without a key would.
    pub fn unconfigured() -> (Self, Arc<MockHandle>) {
        let (mut client, handle) = Self::new();
        client.configured = false;
        (client, handle)
    }
}

#[async_trait]
impl LowLevelClient for MockClient {
    async fn ask_raw(&self, prompt: Prompt) -> Result<String, AIError> {
        let call = self.handle.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(call, prompt = %prompt.name, "Mock client received prompt");

        let response = self.handle.next_for(&prompt);
        lock(&self.handle.prompts).push(prompt);

        match response {
            Some(MockResponse::Text(text)) => Ok(text),
            Some(MockResponse::Json(value)) => Ok(value.to_string()),
            Some(MockResponse::Error(message)) => Err(AIError::Mock(message)),
            None => Err(AIError::Mock("no scripted response left".to_string())),
        }
    }

    fn ensure_configured(&self) -> Result<(), AIError> {
        if self.configured {
            Ok(())
        } else {
            Err(AIError::MissingCredential("MOCK_API_KEY"))
        }
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn routes_take_precedence_over_queue() {
        let (client, handle) = MockClient::with_responses(vec![MockResponse::Text("queued".into())]);
        handle.route("Subject(s): Physics", vec![MockResponse::Json(json!({"routed": true}))]);

        let routed = client.ask_raw(Prompt::new("p", "s", "- Subject(s): Physics\n")).await.unwrap();
        let queued = client.ask_raw(Prompt::new("p", "s", "- Subject(s): History\n")).await.unwrap();

        assert_eq!(routed, "{\"routed\":true}");
        assert_eq!(queued, "queued");
        assert_eq!(handle.call_count(), 2);
        assert_eq!(handle.prompts().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_is_an_error() {
        let (client, handle) = MockClient::new();
        assert!(client.ask_raw(Prompt::new("p", "s", "u")).await.is_err());
        assert_eq!(handle.call_count(), 1);
        assert_eq!(handle.remaining(), 0);
    }
}
