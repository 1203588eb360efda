use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProviderKind;
use crate::errors::ChatResult;
use crate::providers::base::{CompletionRequest, Provider};

/// A mock provider that returns pre-configured replies and records every request
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<Vec<ChatResult<String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(replies: Vec<ChatResult<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            ..Self::default()
        }
    }

    /// Hold every reply back for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Relay
    }

    fn model(&self) -> String {
        "mock-model".to_string()
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(String::new())
        } else {
            replies.remove(0)
        }
    }
}
