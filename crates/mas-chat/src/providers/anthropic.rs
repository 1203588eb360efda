use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::base::{CompletionRequest, DecodedReply, FrameStream, Provider, StreamFrame};
use super::sse::{self, SseEvent};
use crate::config::{ChatSettings, ProviderKind};
use crate::errors::{ChatError, ChatResult};
use crate::transport::Transport;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API: structured messages in, content blocks out, SSE when streaming
pub struct AnthropicProvider {
    transport: Transport,
    settings: ChatSettings,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    message: String,
}

impl ApiError {
    fn into_chat_error(self) -> ChatError {
        match self.kind.as_str() {
            "overloaded_error" => ChatError::ServiceUnavailable(self.message),
            _ => ChatError::Provider {
                status: None,
                message: self.message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

impl AnthropicProvider {
    pub fn new(settings: ChatSettings) -> ChatResult<Self> {
        Ok(Self {
            transport: Transport::new()?,
            settings,
        })
    }

    fn payload(&self, request: &CompletionRequest, stream: bool) -> Value {
        let mut messages: Vec<Value> = request
            .history
            .iter()
            .map(|entry| json!({ "role": entry.role, "content": entry.content }))
            .collect();
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut payload = json!({
            "model": self.settings.model(),
            "system": request.system,
            "messages": messages,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });
        if stream {
            payload["stream"] = json!(true);
        }
        payload
    }

    fn post(&self, payload: &Value) -> RequestBuilder {
        self.transport
            .client()
            .post(self.settings.api_url())
            .header("x-api-key", self.settings.api_key.trim())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
    }

    fn decode(body: Value) -> DecodedReply {
        match serde_json::from_value::<MessagesReply>(body.clone()) {
            Ok(reply) => {
                let texts: Vec<String> = reply
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text),
                        ContentBlock::Other => None,
                    })
                    .collect();
                if texts.is_empty() {
                    DecodedReply::Unrecognized(body)
                } else {
                    DecodedReply::Text(texts.concat())
                }
            }
            Err(_) => DecodedReply::Unrecognized(body),
        }
    }
}

/// What a single SSE event means for the reply
#[derive(Debug)]
enum FrameEvent {
    Delta(String),
    Stop,
    Failed(ApiError),
    Ignored,
}

fn decode_event(event: &SseEvent) -> Option<FrameEvent> {
    if event.data.trim() == "[DONE]" {
        return Some(FrameEvent::Stop);
    }
    match serde_json::from_str::<StreamEvent>(&event.data).ok()? {
        StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Some(FrameEvent::Delta(text)),
        StreamEvent::MessageStop => Some(FrameEvent::Stop),
        StreamEvent::Error { error } => Some(FrameEvent::Failed(error)),
        _ => Some(FrameEvent::Ignored),
    }
}

/// Turn SSE events into reply frames, ending with exactly one `Stop`
fn frames(mut events: futures::stream::BoxStream<'static, ChatResult<SseEvent>>) -> FrameStream {
    async_stream::stream! {
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            match decode_event(&event) {
                Some(FrameEvent::Delta(text)) => yield Ok(StreamFrame::Delta(text)),
                Some(FrameEvent::Stop) => {
                    yield Ok(StreamFrame::Stop);
                    return;
                }
                Some(FrameEvent::Failed(error)) => {
                    yield Err(error.into_chat_error());
                    return;
                }
                Some(FrameEvent::Ignored) => {}
                None => warn!(data = %event.data, "skipping malformed stream frame"),
            }
        }
        // Body ended without a terminal frame
        yield Ok(StreamFrame::Stop);
    }
    .boxed()
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> String {
        self.settings.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        debug!(agent = %request.agent, model = %self.settings.model(), "messages request");
        let builder = self.post(&self.payload(request, false));
        let body = self
            .transport
            .fetch_with_timeout(builder, self.settings.timeout())
            .await?;

        Ok(Self::decode(body).into_text(self.kind()))
    }

    async fn stream(&self, request: &CompletionRequest) -> ChatResult<FrameStream> {
        debug!(agent = %request.agent, model = %self.settings.model(), "streaming messages request");
        let builder = self.post(&self.payload(request, true));
        let response = self
            .transport
            .open_with_timeout(builder, self.settings.timeout())
            .await?;

        Ok(frames(sse::events(
            response.bytes_stream(),
            self.settings.timeout(),
        )))
    }
}
