use anyhow::{Context, Result};
use console::style;
use futures::StreamExt;

use mas_chat::config::Settings;
use mas_chat::models::agent::AgentId;

use super::backend::client;
use crate::render::print_json;

pub async fn watch(settings: &Settings, agent: AgentId) -> Result<()> {
    let backend = client(settings)?;
    let url = backend.updates_url(agent);
    let mut updates = backend
        .subscribe_to_agent_updates(agent)
        .await
        .with_context(|| format!("Failed to subscribe to {url}"))?;

    println!(
        "{} {}",
        style(format!("Watching the {}", agent.name())).bold(),
        style("- Ctrl+C to stop").dim()
    );

    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(update) => print_json(&update)?,
                None => {
                    println!("{}", style("Connection closed by the backend").yellow());
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
