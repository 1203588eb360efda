use std::sync::Arc;

use super::{
    anthropic::AnthropicProvider, base::Provider, huggingface::HuggingFaceProvider,
    relay::RelayProvider,
};
use crate::backend::BackendClient;
use crate::config::{ChatSettings, ProviderKind};
use crate::errors::{ChatError, ChatResult};

/// Build the provider named by `settings.provider`. The relay needs a backend client.
pub fn get_provider(
    settings: &ChatSettings,
    backend: Option<Arc<BackendClient>>,
) -> ChatResult<Box<dyn Provider>> {
    match settings.provider {
        ProviderKind::HuggingFace => Ok(Box::new(HuggingFaceProvider::new(settings.clone())?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(settings.clone())?)),
        ProviderKind::Relay => {
            let backend = backend.ok_or_else(|| {
                ChatError::Config("the relay provider requires a backend client".to_string())
            })?;
            Ok(Box::new(RelayProvider::new(backend, settings)))
        }
    }
}
