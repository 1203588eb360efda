use anyhow::{Context, Result};
use console::style;
use serde_json::{json, Value};

use mas_chat::backend::BackendClient;
use mas_chat::config::Settings;
use mas_chat::models::agent::AgentId;

use crate::render::print_json;

pub(crate) fn client(settings: &Settings) -> Result<BackendClient> {
    BackendClient::new(settings.backend.clone()).context("Failed to create backend client")
}

pub async fn status(settings: &Settings, agent: Option<AgentId>) -> Result<()> {
    let backend = client(settings)?;
    let status = match agent {
        Some(agent) => backend.get_agent_status(agent).await?,
        None => backend.get_all_agents_status().await?,
    };
    print_json(&status)
}

pub async fn alerts(settings: &Settings, severity: Option<&str>) -> Result<()> {
    let alerts = client(settings)?.get_system_alerts(severity).await?;
    print_json(&alerts)
}

pub async fn metrics(settings: &Settings, agent: AgentId, range: Option<&str>) -> Result<()> {
    let metrics = client(settings)?.get_agent_metrics(agent, range).await?;
    print_json(&metrics)
}

fn parse_params(params: Option<&str>) -> Result<Value> {
    match params {
        None => Ok(json!({})),
        Some(raw) => {
            let value: Value =
                serde_json::from_str(raw).context("--params must be valid JSON")?;
            anyhow::ensure!(value.is_object(), "--params must be a JSON object");
            Ok(value)
        }
    }
}

pub async fn action(
    settings: &Settings,
    agent: AgentId,
    action: &str,
    params: Option<&str>,
) -> Result<()> {
    let params = parse_params(params)?;
    let result = client(settings)?
        .execute_action(agent, action, params)
        .await?;
    print_json(&result)
}

pub async fn health(settings: &Settings) -> Result<()> {
    let report = client(settings)?.health_check().await;
    if report.get("status").and_then(Value::as_str) == Some("error") {
        println!(
            "{}",
            style(format!("Backend at {} is unreachable", settings.backend.base_url)).red()
        );
    }
    print_json(&report)
}
