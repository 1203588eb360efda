use std::sync::Arc;

use futures::stream::StreamExt;
use serde::Serialize;
use tracing::debug;

use crate::backend::BackendClient;
use crate::config::ChatSettings;
use crate::errors::{ChatError, ChatResult};
use crate::models::agent::AgentId;
use crate::models::message::HistoryEntry;
use crate::providers::base::{CompletionRequest, FrameStream, Provider, StreamFrame};
use crate::providers::factory::get_provider;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub agent_id: AgentId,
    pub model: String,
}

/// Sends prompts to the configured language-model provider
pub struct ChatClient {
    provider: Box<dyn Provider>,
    settings: ChatSettings,
}

impl ChatClient {
    pub fn new(settings: ChatSettings, backend: Option<Arc<BackendClient>>) -> ChatResult<Self> {
        let provider = get_provider(&settings, backend)?;
        Ok(Self::with_provider(settings, provider))
    }

    pub fn with_provider(settings: ChatSettings, provider: Box<dyn Provider>) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn model(&self) -> String {
        self.provider.model()
    }

    /// Fails with `ChatError::Config` when a request could not be authenticated or addressed
    pub fn ensure_configured(&self) -> ChatResult<()> {
        let report = self.settings.validate();
        if report.valid {
            Ok(())
        } else {
            Err(ChatError::Config(report.issues.join("; ")))
        }
    }

    fn request(&self, prompt: &str, agent: AgentId, history: &[HistoryEntry]) -> CompletionRequest {
        CompletionRequest::new(agent, prompt).with_history(history.to_vec())
    }

    pub async fn send_chat_message(
        &self,
        prompt: &str,
        agent: AgentId,
        history: &[HistoryEntry],
    ) -> ChatResult<ChatReply> {
        self.ensure_configured()?;
        debug!(%agent, provider = %self.provider.kind(), history = history.len(), "sending chat message");

        let message = self
            .provider
            .complete(&self.request(prompt, agent, history))
            .await?;
        Ok(ChatReply {
            message,
            agent_id: agent,
            model: self.provider.model(),
        })
    }

    pub async fn stream_chat_message(
        &self,
        prompt: &str,
        agent: AgentId,
        history: &[HistoryEntry],
    ) -> ChatResult<FrameStream> {
        self.ensure_configured()?;
        debug!(%agent, provider = %self.provider.kind(), "streaming chat message");

        self.provider
            .stream(&self.request(prompt, agent, history))
            .await
    }

    /// Stream a reply into `on_chunk`: `(delta, false)` per delta, then `("", true)` once.
    /// The final call also happens when the stream fails part way.
    /// Returns the assembled reply.
    pub async fn stream_chat_message_with<F>(
        &self,
        prompt: &str,
        agent: AgentId,
        history: &[HistoryEntry],
        mut on_chunk: F,
    ) -> ChatResult<ChatReply>
    where
        F: FnMut(&str, bool),
    {
        let mut frames = self.stream_chat_message(prompt, agent, history).await?;
        let mut message = String::new();

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    on_chunk("", true);
                    return Err(e);
                }
            };
            match frame {
                StreamFrame::Delta(text) => {
                    on_chunk(&text, false);
                    message.push_str(&text);
                }
                StreamFrame::Stop => {
                    on_chunk("", true);
                    break;
                }
            }
        }

        Ok(ChatReply {
            message: message.trim().to_string(),
            agent_id: agent,
            model: self.provider.model(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::models::message::Role;
    use crate::providers::mock::MockProvider;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_client(provider: MockProvider) -> ChatClient {
        ChatClient::with_provider(ChatSettings::new(ProviderKind::Relay, ""), Box::new(provider))
    }

    #[tokio::test]
    async fn test_send_chat_message() {
        let provider = MockProvider::new(vec![Ok("Stock is healthy.".to_string())]);
        let client = mock_client(provider.clone());

        let history = vec![HistoryEntry::new(Role::User, "hello")];
        let reply = client
            .send_chat_message("status?", AgentId::Inventory, &history)
            .await
            .unwrap();

        assert_eq!(
            reply,
            ChatReply {
                message: "Stock is healthy.".into(),
                agent_id: AgentId::Inventory,
                model: "mock-model".into(),
            }
        );
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "status?");
        assert_eq!(requests[0].history, history);
        assert_eq!(requests[0].system, AgentId::Inventory.system_prompt());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"generated_text": "x"}])))
            .expect(0)
            .mount(&server)
            .await;

        let settings = ChatSettings::new(ProviderKind::HuggingFace, "PASTE_YOUR_TOKEN_HERE")
            .with_api_url(server.uri());
        let client = ChatClient::new(settings, None).unwrap();

        let err = client
            .send_chat_message("hi", AgentId::Supervisory, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));

        let err = client
            .stream_chat_message("hi", AgentId::Supervisory, &[])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[tokio::test]
    async fn test_stream_callback_order() {
        let server = MockServer::start().await;
        let body = [
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "A"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "B"}}),
            json!({"type": "message_stop"}),
        ]
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect::<String>();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let settings = ChatSettings::new(ProviderKind::Anthropic, "sk-test").with_api_url(server.uri());
        let client = ChatClient::new(settings, None).unwrap();

        let mut chunks = Vec::new();
        let reply = client
            .stream_chat_message_with("go", AgentId::Production, &[], |text, done| {
                chunks.push((text.to_string(), done))
            })
            .await
            .unwrap();

        assert_eq!(
            chunks,
            vec![
                ("A".to_string(), false),
                ("B".to_string(), false),
                (String::new(), true)
            ]
        );
        assert_eq!(reply.message, "AB");
    }

    #[tokio::test]
    async fn test_stream_failure_still_ends_callbacks() {
        let server = MockServer::start().await;
        let body = [
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Par"}}),
            json!({"type": "error", "error": {"type": "api_error", "message": "Internal error"}}),
        ]
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect::<String>();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let settings = ChatSettings::new(ProviderKind::Anthropic, "sk-test").with_api_url(server.uri());
        let client = ChatClient::new(settings, None).unwrap();

        let mut chunks = Vec::new();
        let err = client
            .stream_chat_message_with("go", AgentId::Production, &[], |text, done| {
                chunks.push((text.to_string(), done))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Provider { .. }));
        assert_eq!(
            chunks,
            vec![("Par".to_string(), false), (String::new(), true)]
        );
    }

    #[tokio::test]
    async fn test_default_stream_is_single_delta() {
        let client = mock_client(MockProvider::new(vec![Ok("whole reply".to_string())]));

        let mut chunks = Vec::new();
        client
            .stream_chat_message_with("go", AgentId::Quality, &[], |text, done| {
                chunks.push((text.to_string(), done))
            })
            .await
            .unwrap();
        assert_eq!(
            chunks,
            vec![("whole reply".to_string(), false), (String::new(), true)]
        );
    }
}
