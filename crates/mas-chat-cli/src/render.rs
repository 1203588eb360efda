use anyhow::{anyhow, Result};
use bat::WrappingMode;
use console::style;
use serde_json::Value;

use mas_chat::models::agent::catalog;
use mas_chat::models::message::Message;

const THEME: &str = "zenburn";

fn print(content: &str, language: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language(language)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render output: {e}"))?;
    Ok(())
}

pub fn print_markdown(content: &str) -> Result<()> {
    print(content, "Markdown")?;
    println!();
    Ok(())
}

pub fn print_json(value: &Value) -> Result<()> {
    print(&serde_json::to_string_pretty(value)?, "JSON")?;
    println!();
    Ok(())
}

/// Header line for an assistant entry: agent, time and where the data came from
pub fn message_header(message: &Message) -> String {
    let agent = message.agent.map(|agent| agent.name()).unwrap_or("Assistant");
    let mut header = format!("{agent} · {}", message.timestamp);
    if let Some(source) = &message.data_source {
        header.push_str(&format!(" · {source}"));
    }
    if message.has_real_data == Some(true) {
        header.push_str(" · live data");
    }
    header
}

pub fn print_message(message: &Message) -> Result<()> {
    println!("{}", style(message_header(message)).dim());
    if message.is_error {
        println!("{}\n", style(&message.content).red());
        Ok(())
    } else {
        print_markdown(&message.content)
    }
}

pub fn print_agents() {
    for agent in catalog() {
        println!(
            "{:<12} {:<22} {}",
            style(agent.id).cyan(),
            agent.name,
            style(agent.description).dim()
        );
    }
}
