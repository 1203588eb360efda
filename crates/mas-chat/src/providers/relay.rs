use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::base::{CompletionRequest, DecodedReply, Provider};
use crate::backend::BackendClient;
use crate::config::{ChatSettings, ProviderKind};
use crate::errors::ChatResult;

/// Lets the factory backend answer through its own `agent.message` handler
pub struct RelayProvider {
    backend: Arc<BackendClient>,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelayReply {
    Plain(String),
    Response { response: String },
    Message { message: String },
}

impl RelayProvider {
    pub fn new(backend: Arc<BackendClient>, settings: &ChatSettings) -> Self {
        Self {
            backend,
            model: settings.model(),
        }
    }

    fn decode(body: Value) -> DecodedReply {
        match serde_json::from_value::<RelayReply>(body.clone()) {
            Ok(RelayReply::Plain(text))
            | Ok(RelayReply::Response { response: text })
            | Ok(RelayReply::Message { message: text }) => DecodedReply::Text(text),
            Err(_) => DecodedReply::Unrecognized(body),
        }
    }
}

#[async_trait]
impl Provider for RelayProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Relay
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        let context = json!({
            "system_prompt": request.system,
            "history": request.history,
        });
        let reply = self
            .backend
            .send_message(request.agent, &request.prompt, context)
            .await?;

        Ok(Self::decode(reply).into_text(self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendSettings;
    use crate::errors::ChatError;
    use crate::models::agent::AgentId;
    use crate::providers::base::UNRECOGNIZED_REPLY;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(result: Value) -> (MockServer, RelayProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(body_partial_json(json!({
                "method": "agent.message",
                "params": {"agent_id": "logistics", "message": "Where is order 42?"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result
            })))
            .mount(&mock_server)
            .await;

        let backend =
            BackendClient::new(BackendSettings::with_base_url(mock_server.uri())).unwrap();
        let provider = RelayProvider::new(
            Arc::new(backend),
            &ChatSettings::new(ProviderKind::Relay, ""),
        );
        (mock_server, provider)
    }

    #[test]
    fn test_decode_shapes() {
        assert_eq!(
            RelayProvider::decode(json!("plain")),
            DecodedReply::Text("plain".into())
        );
        assert_eq!(
            RelayProvider::decode(json!({"response": "from response"})),
            DecodedReply::Text("from response".into())
        );
        assert_eq!(
            RelayProvider::decode(json!({"message": "from message"})),
            DecodedReply::Text("from message".into())
        );
        assert!(matches!(
            RelayProvider::decode(json!({"status": "ok"})),
            DecodedReply::Unrecognized(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_through_backend() {
        let (_server, provider) =
            setup_mock_server(json!({"response": "Order 42 ships tomorrow."})).await;

        let reply = provider
            .complete(&CompletionRequest::new(AgentId::Logistics, "Where is order 42?"))
            .await
            .unwrap();
        assert_eq!(reply, "Order 42 ships tomorrow.");
        assert_eq!(provider.model(), "factory-backend");
    }

    #[tokio::test]
    async fn test_unrecognized_reply() {
        let (_server, provider) = setup_mock_server(json!({"ack": true})).await;
        let reply = provider
            .complete(&CompletionRequest::new(AgentId::Logistics, "Where is order 42?"))
            .await
            .unwrap();
        assert_eq!(reply, UNRECOGNIZED_REPLY);
    }

    #[tokio::test]
    async fn test_backend_failure_is_chat_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;
        let backend =
            BackendClient::new(BackendSettings::with_base_url(mock_server.uri())).unwrap();
        let provider = RelayProvider::new(
            Arc::new(backend),
            &ChatSettings::new(ProviderKind::Relay, ""),
        );

        let err = provider
            .complete(&CompletionRequest::new(AgentId::Logistics, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Provider { status: Some(502), .. }));
    }
}
