use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{CompletionRequest, DecodedReply, Provider};
use crate::config::{ChatSettings, ProviderKind};
use crate::errors::{ChatError, ChatResult};
use crate::prompt::render_transcript;
use crate::transport::Transport;

const EMPTY_GENERATION: &str = "No response generated";

/// Text-generation inference endpoint: one prompt string in, a list of generations out
pub struct HuggingFaceProvider {
    transport: Transport,
    settings: ChatSettings,
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationReply {
    Batch(Vec<Generation>),
    Single(Generation),
}

impl HuggingFaceProvider {
    pub fn new(settings: ChatSettings) -> ChatResult<Self> {
        Ok(Self {
            transport: Transport::new()?,
            settings,
        })
    }

    fn payload(&self, request: &CompletionRequest) -> ChatResult<Value> {
        let inputs = render_transcript(&request.system, &request.history, &request.prompt)
            .map_err(|e| ChatError::Prompt(e.to_string()))?;

        Ok(json!({
            "inputs": inputs,
            "parameters": {
                "max_new_tokens": self.settings.max_tokens,
                "temperature": self.settings.temperature,
                "top_p": self.settings.top_p,
                "do_sample": true,
                "return_full_text": false,
            }
        }))
    }

    fn decode(body: Value) -> DecodedReply {
        match serde_json::from_value::<GenerationReply>(body.clone()) {
            Ok(GenerationReply::Batch(generations)) => match generations.into_iter().next() {
                Some(first) => DecodedReply::Text(
                    first
                        .generated_text
                        .filter(|text| !text.is_empty())
                        .unwrap_or_else(|| EMPTY_GENERATION.to_string()),
                ),
                None => DecodedReply::Unrecognized(body),
            },
            Ok(GenerationReply::Single(Generation {
                generated_text: Some(text),
            })) if text.is_empty() => DecodedReply::Text(EMPTY_GENERATION.to_string()),
            Ok(GenerationReply::Single(Generation {
                generated_text: Some(text),
            })) => DecodedReply::Text(text),
            _ => DecodedReply::Unrecognized(body),
        }
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn model(&self) -> String {
        self.settings.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        let payload = self.payload(request)?;
        debug!(agent = %request.agent, url = %self.settings.api_url(), "text generation request");

        let builder = self
            .transport
            .client()
            .post(self.settings.api_url())
            .bearer_auth(self.settings.api_key.trim())
            .json(&payload);
        let body = self
            .transport
            .fetch_with_timeout(builder, self.settings.timeout())
            .await?;

        Ok(Self::decode(body).into_text(self.kind()))
    }
}
