use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// Parsed JSON frames pushed by the backend for one agent.
/// Dropping the stream closes the socket.
pub type UpdateStream = BoxStream<'static, Value>;

/// Thin wrapper around a shared reqwest client that bounds every exchange by a timeout
#[derive(Debug, Clone, Default)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request and decode a JSON body, all within `timeout`.
    ///
    /// The timer belongs to the awaited future, so it is released on every exit
    /// path: success, HTTP error, decode failure or elapsed deadline.
    pub async fn fetch_with_timeout(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let exchange = async {
            let response = Self::checked(request.header(CONTENT_TYPE, "application/json")).await?;
            let body = response.bytes().await?;
            serde_json::from_slice::<Value>(&body).map_err(|e| TransportError::Decode(e.to_string()))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "request timed out");
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    /// Send the request and hand back the successful response without reading its body.
    /// Only connecting and receiving the status line count against `timeout`.
    pub async fn open_with_timeout(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let request = request.header(CONTENT_TYPE, "application/json");
        match tokio::time::timeout(timeout, Self::checked(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn checked(request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "request failed");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Derive the WebSocket base from an HTTP base URL: trailing slashes are dropped
/// and the `http` scheme prefix becomes `ws` (`https` becomes `wss`).
pub fn websocket_base(http_base: &str) -> String {
    let trimmed = http_base.trim_end_matches('/');
    match trimmed.get(..4) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http") => format!("ws{}", &trimmed[4..]),
        _ => trimmed.to_string(),
    }
}

/// Open a WebSocket and yield each inbound frame parsed as JSON.
///
/// Frames that are not valid JSON are logged and discarded. The stream ends when
/// the server closes the connection or the socket fails; there is no reconnect.
pub async fn subscribe(url: &str) -> Result<UpdateStream, TransportError> {
    let (socket, _) = connect_async(url).await?;
    debug!(url, "websocket connected");
    let url = url.to_string();

    let updates = async_stream::stream! {
        let mut socket = socket;
        while let Some(frame) = socket.next().await {
            let text = match frame {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!(url = %url, error = %e, "websocket error");
                    break;
                }
            };

            match serde_json::from_str::<Value>(&text) {
                Ok(value) => yield value,
                Err(e) => warn!(url = %url, error = %e, "discarding unparseable websocket frame"),
            }
        }
        debug!(url = %url, "websocket connection closed");
    };

    Ok(updates.boxed())
}
