use anyhow::Result;
use mas_chat::{
    config::{BackendSettings, ChatSettings, ProviderKind, Settings},
    conversation::{Conversation, SendOutcome},
    models::{agent::AgentId, message::Message},
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A factory backend and a model endpoint, both mocked
struct PipelineTester {
    backend: MockServer,
    model: MockServer,
}

impl PipelineTester {
    async fn new() -> Self {
        Self {
            backend: MockServer::start().await,
            model: MockServer::start().await,
        }
    }

    async fn with_status(self, agent: &str, response: ResponseTemplate) -> Self {
        Mock::given(method("POST"))
            .and(path("/api/mcp"))
            .and(body_partial_json(json!({
                "method": "agent.status",
                "params": {"agent_id": agent}
            })))
            .respond_with(response)
            .mount(&self.backend)
            .await;
        self
    }

    async fn with_model(self, response: ResponseTemplate, expected_calls: u64) -> Self {
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(response)
            .expect(expected_calls)
            .mount(&self.model)
            .await;
        self
    }

    fn settings(&self, provider: ProviderKind, api_key: &str) -> Settings {
        Settings {
            backend: BackendSettings::with_base_url(self.backend.uri()),
            chat: ChatSettings::new(provider, api_key)
                .with_api_url(format!("{}/generate", self.model.uri())),
        }
    }

    async fn model_bodies(&self) -> Vec<Value> {
        self.model
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

fn completed(outcome: SendOutcome) -> Message {
    match outcome {
        SendOutcome::Completed(message) => message,
        other => panic!("Expected a completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn test_live_status_reaches_the_model() -> Result<()> {
    let tester = PipelineTester::new()
        .await
        .with_status(
            "inventory",
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 7,
                "result": {"stockUnits": 120, "reorderFlags": 3}
            })),
        )
        .await
        .with_model(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"generated_text": " 120 units, 3 items need reordering."}])),
            1,
        )
        .await;

    let conversation =
        Conversation::from_settings(&tester.settings(ProviderKind::HuggingFace, "hf_test"))?;
    let reply = completed(conversation.send(AgentId::Inventory, "status?").await);

    assert_eq!(reply.content, "120 units, 3 items need reordering.");
    assert_eq!(reply.has_real_data, Some(true));
    assert!(reply.data_source.as_deref().unwrap_or_default().contains("backend"));

    let bodies = tester.model_bodies().await;
    let inputs = bodies[0]["inputs"].as_str().unwrap_or_default();
    assert!(inputs.starts_with(AgentId::Inventory.system_prompt()));
    assert!(inputs.contains("\"stockUnits\": 120"));
    Ok(())
}

#[tokio::test]
async fn test_backend_outage_does_not_block_the_chat() -> Result<()> {
    let tester = PipelineTester::new()
        .await
        .with_status("production", ResponseTemplate::new(500))
        .await
        .with_model(
            ResponseTemplate::new(200).set_body_json(json!({"generated_text": "Running on general knowledge."})),
            1,
        )
        .await;

    let conversation =
        Conversation::from_settings(&tester.settings(ProviderKind::HuggingFace, "hf_test"))?;
    let reply = completed(conversation.send(AgentId::Production, "How are the lines?").await);

    assert!(!reply.is_error);
    assert_eq!(reply.has_real_data, Some(false));
    Ok(())
}

#[tokio::test]
async fn test_missing_credential_makes_no_calls() -> Result<()> {
    let tester = PipelineTester::new()
        .await
        .with_model(ResponseTemplate::new(200).set_body_json(json!([])), 0)
        .await;

    let conversation = Conversation::from_settings(&tester.settings(ProviderKind::HuggingFace, ""))?;
    let reply = completed(conversation.send(AgentId::Quality, "Defect rate?").await);

    assert!(reply.is_error);
    assert!(reply.content.contains("API key not configured"));
    assert!(tester.backend.received_requests().await.unwrap_or_default().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_loading_and_rate_limit_hints_differ() -> Result<()> {
    let loading = PipelineTester::new()
        .await
        .with_model(
            ResponseTemplate::new(503).set_body_json(json!({"error": "Model is currently loading"})),
            1,
        )
        .await;
    let limited = PipelineTester::new()
        .await
        .with_model(ResponseTemplate::new(429).set_body_json(json!({"error": "Too many requests"})), 1)
        .await;

    let first = Conversation::from_settings(&loading.settings(ProviderKind::HuggingFace, "hf_test"))?;
    let second = Conversation::from_settings(&limited.settings(ProviderKind::HuggingFace, "hf_test"))?;

    let loading_reply = completed(first.send(AgentId::Supervisory, "hi").await);
    let limited_reply = completed(second.send(AgentId::Supervisory, "hi").await);

    assert!(loading_reply.is_error && limited_reply.is_error);
    assert!(loading_reply.content.contains("20-30 seconds"));
    assert!(limited_reply.content.contains("Rate limit"));
    assert_ne!(loading_reply.content, limited_reply.content);
    Ok(())
}

#[tokio::test]
async fn test_relay_answers_through_backend() -> Result<()> {
    let tester = PipelineTester::new()
        .await
        .with_status(
            "logistics",
            ResponseTemplate::new(200).set_body_json(json!({"result": {"activeShipments": 15}})),
        )
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "agent.message", "params": {"agent_id": "logistics"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"response": "15 shipments en route."}})))
        .expect(1)
        .mount(&tester.backend)
        .await;

    let conversation = Conversation::from_settings(&tester.settings(ProviderKind::Relay, ""))?;
    let reply = completed(conversation.send(AgentId::Logistics, "Shipments?").await);

    assert_eq!(reply.content, "15 shipments en route.");
    assert_eq!(reply.has_real_data, Some(true));
    assert!(reply.data_source.as_deref().unwrap_or_default().ends_with("factory-backend"));
    Ok(())
}

#[tokio::test]
async fn test_streaming_turn() -> Result<()> {
    let body: String = [
        json!({"type": "message_start", "message": {"id": "msg_1"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "All "}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "clear."}}),
        json!({"type": "message_stop"}),
    ]
    .iter()
    .map(|event| format!("event: {}\ndata: {event}\n\n", event["type"].as_str().unwrap_or_default()))
    .collect();

    let tester = PipelineTester::new()
        .await
        .with_model(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
            1,
        )
        .await;

    let conversation = Conversation::from_settings(&tester.settings(ProviderKind::Anthropic, "sk-test"))?;
    let mut chunks = Vec::new();
    let reply = completed(
        conversation
            .send_streaming(AgentId::Maintenance, "Any alerts?", |text, done| {
                chunks.push((text.to_string(), done))
            })
            .await,
    );

    assert_eq!(reply.content, "All clear.");
    assert_eq!(
        chunks,
        vec![
            ("All ".to_string(), false),
            ("clear.".to_string(), false),
            (String::new(), true)
        ]
    );
    assert_eq!(conversation.messages().len(), 2);
    Ok(())
}
