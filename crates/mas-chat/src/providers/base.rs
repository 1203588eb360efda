use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tracing::warn;

use crate::config::ProviderKind;
use crate::errors::ChatResult;
use crate::models::agent::AgentId;
use crate::models::message::HistoryEntry;

/// Substituted for a reply whose shape no decoder recognizes
pub const UNRECOGNIZED_REPLY: &str = "Response received but in unexpected format.";

/// Everything a provider needs for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub agent: AgentId,
    pub system: String,
    pub prompt: String,
    pub history: Vec<HistoryEntry>,
}

impl CompletionRequest {
    pub fn new<S: Into<String>>(agent: AgentId, prompt: S) -> Self {
        Self {
            agent,
            system: agent.system_prompt().to_string(),
            prompt: prompt.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Delta(String),
    Stop,
}

/// Incremental reply. Ends after exactly one `Stop`, or after the first error.
pub type FrameStream = BoxStream<'static, ChatResult<StreamFrame>>;

/// Result of running a provider's reply decoder
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedReply {
    Text(String),
    Unrecognized(Value),
}

impl DecodedReply {
    pub fn into_text(self, provider: ProviderKind) -> String {
        match self {
            DecodedReply::Text(text) => text.trim().to_string(),
            DecodedReply::Unrecognized(body) => {
                warn!(%provider, %body, "unexpected response format");
                UNRECOGNIZED_REPLY.to_string()
            }
        }
    }
}

/// Base trait for language-model endpoints
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model name reported alongside each reply
    fn model(&self) -> String;

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String>;

    /// Providers without incremental output deliver the whole reply as one delta
    async fn stream(&self, request: &CompletionRequest) -> ChatResult<FrameStream> {
        let text = self.complete(request).await?;
        Ok(stream::iter([Ok(StreamFrame::Delta(text)), Ok(StreamFrame::Stop)]).boxed())
    }
}
