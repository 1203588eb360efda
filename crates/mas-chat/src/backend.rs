//! Client for the factory backend's JSON-RPC shaped ("MCP") endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{Display, EnumIter};
use tracing::debug;

use crate::config::BackendSettings;
use crate::errors::{BackendError, BackendFailure, TransportError};
use crate::models::agent::AgentId;
use crate::transport::{self, Transport, UpdateStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
pub enum McpMethod {
    #[serde(rename = "agent.message")]
    #[strum(serialize = "agent.message")]
    AgentMessage,
    #[serde(rename = "agent.status")]
    #[strum(serialize = "agent.status")]
    AgentStatus,
    #[serde(rename = "system.status")]
    #[strum(serialize = "system.status")]
    SystemStatus,
    #[serde(rename = "agent.action")]
    #[strum(serialize = "agent.action")]
    AgentAction,
    #[serde(rename = "agent.metrics")]
    #[strum(serialize = "agent.metrics")]
    AgentMetrics,
    #[serde(rename = "system.alerts")]
    #[strum(serialize = "system.alerts")]
    SystemAlerts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: McpMethod,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Unwrap a backend answer: the `result` member when present, otherwise the whole body.
/// A body carrying only an `error` member is a failed call.
fn unwrap_response(mut response: Value) -> Result<Value, BackendFailure> {
    match response.get_mut("result").map(Value::take) {
        Some(result) if !result.is_null() => return Ok(result),
        _ => {}
    }

    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        let error: RpcErrorBody =
            serde_json::from_value(error.clone()).unwrap_or(RpcErrorBody {
                code: 0,
                message: error.to_string(),
            });
        return Err(BackendFailure::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    Ok(response)
}

/// Source of live agent status for the conversation
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn agent_status(&self, agent: AgentId) -> Result<Value, BackendError>;
}

pub struct BackendClient {
    transport: Transport,
    settings: BackendSettings,
    next_id: AtomicU64,
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, TransportError> {
        Ok(Self::with_transport(Transport::new()?, settings))
    }

    pub fn with_transport(transport: Transport, settings: BackendSettings) -> Self {
        // Request ids start from the wall clock so they stay unique across restarts
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self {
            transport,
            settings,
            next_id: AtomicU64::new(seed),
        }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    pub fn request(&self, method: McpMethod, params: Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        }
    }

    async fn call(&self, method: McpMethod, params: Value) -> Result<Value, BackendFailure> {
        let request = self.request(method, params);
        debug!(method = %request.method, id = request.id, "backend call");

        let builder = self
            .transport
            .client()
            .post(self.settings.mcp_url())
            .json(&request);
        let response = self
            .transport
            .fetch_with_timeout(builder, self.settings.timeout())
            .await?;
        unwrap_response(response)
    }

    /// Forward a free-text message to an agent (`agent.message`)
    pub async fn send_message(
        &self,
        agent: AgentId,
        message: &str,
        context: Value,
    ) -> Result<Value, BackendError> {
        let params = json!({
            "agent_id": agent,
            "message": message,
            "context": context,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.call(McpMethod::AgentMessage, params)
            .await
            .map_err(|e| BackendError::new(format!("Failed to send message to {agent}"), e))
    }

    pub async fn get_agent_status(&self, agent: AgentId) -> Result<Value, BackendError> {
        self.call(McpMethod::AgentStatus, json!({ "agent_id": agent }))
            .await
            .map_err(|e| BackendError::new(format!("Failed to get status for {agent}"), e))
    }

    pub async fn get_all_agents_status(&self) -> Result<Value, BackendError> {
        self.call(McpMethod::SystemStatus, json!({}))
            .await
            .map_err(|e| BackendError::new("Failed to get system status", e))
    }

    pub async fn execute_action(
        &self,
        agent: AgentId,
        action: &str,
        parameters: Value,
    ) -> Result<Value, BackendError> {
        let params = json!({
            "agent_id": agent,
            "action": action,
            "parameters": parameters,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.call(McpMethod::AgentAction, params)
            .await
            .map_err(|e| BackendError::new(format!("Failed to execute action on {agent}"), e))
    }

    pub async fn get_agent_metrics(
        &self,
        agent: AgentId,
        time_range: Option<&str>,
    ) -> Result<Value, BackendError> {
        let params = json!({
            "agent_id": agent,
            "time_range": time_range.unwrap_or("1h"),
        });
        self.call(McpMethod::AgentMetrics, params)
            .await
            .map_err(|e| BackendError::new(format!("Failed to get metrics for {agent}"), e))
    }

    pub async fn get_system_alerts(&self, severity: Option<&str>) -> Result<Value, BackendError> {
        let params = json!({ "severity": severity.unwrap_or("all") });
        self.call(McpMethod::SystemAlerts, params)
            .await
            .map_err(|e| BackendError::new("Failed to get system alerts", e))
    }

    /// Probe `GET /health`. Never fails: problems are reported in the returned body.
    pub async fn health_check(&self) -> Value {
        let builder = self.transport.client().get(self.settings.health_url());
        match self
            .transport
            .fetch_with_timeout(builder, self.settings.health_timeout())
            .await
        {
            Ok(body) => body,
            Err(e) => json!({ "status": "error", "message": e.to_string() }),
        }
    }

    pub fn updates_url(&self, agent: AgentId) -> String {
        format!(
            "{}/ws/agent/{}",
            transport::websocket_base(&self.settings.base_url),
            agent
        )
    }

    /// Live updates pushed by the backend for one agent
    pub async fn subscribe_to_agent_updates(
        &self,
        agent: AgentId,
    ) -> Result<UpdateStream, TransportError> {
        transport::subscribe(&self.updates_url(agent)).await
    }
}

#[async_trait]
impl StatusSource for BackendClient {
    async fn agent_status(&self, agent: AgentId) -> Result<Value, BackendError> {
        self.get_agent_status(agent).await
    }
}
