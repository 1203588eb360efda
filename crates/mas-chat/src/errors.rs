use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Failures of a single HTTP or WebSocket exchange
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error! status: {status}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid JSON in response: {0}")]
    Decode(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum BackendFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("backend error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// A backend call failure, wrapped with the operation it belonged to
#[derive(Error, Debug)]
#[error("{context}: {failure}")]
pub struct BackendError {
    pub context: String,
    #[source]
    pub failure: BackendFailure,
}

impl BackendError {
    pub fn new(context: impl Into<String>, failure: impl Into<BackendFailure>) -> Self {
        Self {
            context: context.into(),
            failure: failure.into(),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error{}: {message}", status_suffix(.status))]
    Provider { status: Option<u16>, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// Classify a non-success HTTP answer from a language-model endpoint
    pub fn from_http(status: u16, body: &str) -> Self {
        let detail = error_detail(body);

        if status == 503 || detail.to_lowercase().contains("loading") {
            return ChatError::ServiceUnavailable(detail);
        }

        match status {
            401 | 403 => ChatError::Auth(status),
            429 => ChatError::RateLimited,
            _ => ChatError::Provider {
                status: Some(status),
                message: detail,
            },
        }
    }

    /// The text shown to the user in place of an assistant reply
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Config(detail) => format!(
                "Chat is not configured: {detail}. Set MAS_CHAT__API_KEY (or `api_key` under [chat] in the config file) and try again."
            ),
            ChatError::Timeout(_) => {
                "Request timeout. The model took too long to respond, please try again.".to_string()
            }
            ChatError::Auth(_) => {
                "Invalid API token. Please check the configured credential.".to_string()
            }
            ChatError::RateLimited => {
                "Rate limit exceeded. Please wait a minute and try again.".to_string()
            }
            ChatError::ServiceUnavailable(_) => {
                "Model is loading. Please wait 20-30 seconds and try again.".to_string()
            }
            ChatError::Network(_) => {
                "Network error. Check your internet connection or firewall settings.".to_string()
            }
            other => format!("Sorry, I encountered an error: {other}"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChatError::Timeout(_)
                | ChatError::RateLimited
                | ChatError::ServiceUnavailable(_)
                | ChatError::Network(_)
        )
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(after) => ChatError::Timeout(after),
            TransportError::Http { status, body } => ChatError::from_http(status, &body),
            TransportError::Network(detail) | TransportError::WebSocket(detail) => {
                ChatError::Network(detail)
            }
            TransportError::Decode(detail) => ChatError::Decode(detail),
        }
    }
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        match err.failure {
            BackendFailure::Transport(source) => ChatError::from(source),
            BackendFailure::Rpc { code, message } => ChatError::Provider {
                status: None,
                message: format!("{}: backend error {code}: {message}", err.context),
            },
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Pull the human-readable part out of a provider error body.
/// Providers answer with `{"error": "..."}`, `{"error": {"message": "..."}}` or plain text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(error) => error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
            None => body.trim().to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_body_is_service_unavailable() {
        let err = ChatError::from_http(
            503,
            r#"{"error": "Model mistralai/Mistral-7B-Instruct-v0.2 is currently loading", "estimated_time": 20.0}"#,
        );
        assert!(matches!(err, ChatError::ServiceUnavailable(_)));

        // "loading" wins even when the status is something else
        let err = ChatError::from_http(500, r#"{"error": "model is loading"}"#);
        assert!(matches!(err, ChatError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_loading_hint_differs_from_rate_limit_hint() {
        let loading = ChatError::from_http(503, r#"{"error": "loading"}"#).user_message();
        let limited = ChatError::from_http(429, "{}").user_message();

        assert!(loading.contains("wait 20-30 seconds and try again"));
        assert!(limited.contains("Rate limit"));
        assert_ne!(loading, limited);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(ChatError::from_http(401, ""), ChatError::Auth(401)));
        assert!(matches!(ChatError::from_http(403, ""), ChatError::Auth(403)));
        assert!(matches!(ChatError::from_http(429, ""), ChatError::RateLimited));

        match ChatError::from_http(400, r#"{"error": {"message": "bad request body"}}"#) {
            ChatError::Provider { status, message } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "bad request body");
            }
            other => panic!("Expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_errors_map_to_chat_categories() {
        let err: ChatError = TransportError::Timeout(Duration::from_secs(30)).into();
        assert!(matches!(err, ChatError::Timeout(_)));
        assert!(err.is_retryable());

        let err: ChatError = TransportError::Network("connection refused".into()).into();
        assert!(err.user_message().starts_with("Network error"));

        let err: ChatError = TransportError::Http {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert_eq!(
            err.user_message(),
            "Sorry, I encountered an error: Provider error (502): bad gateway"
        );
    }

    #[test]
    fn test_config_message_carries_guidance() {
        let err = ChatError::Config("API key not configured".into());
        let text = err.user_message();
        assert!(text.contains("API key not configured"));
        assert!(text.contains("MAS_CHAT__API_KEY"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(
            "Failed to get status for inventory",
            TransportError::Http {
                status: 404,
                body: String::new(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Failed to get status for inventory: HTTP error! status: 404"
        );
    }
}
