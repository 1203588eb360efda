use serde::Serialize;
use serde_json::Value;
use tera::{Context, Error as TeraError, Tera};

use crate::models::agent::AgentId;
use crate::models::message::{HistoryEntry, Message};

const TRANSCRIPT_TEMPLATE: &str = include_str!("prompts/transcript.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Instruction template for an agent id as sent by a client.
/// Unknown ids get the supervisory template.
pub fn template_for(agent_id: &str) -> &'static str {
    AgentId::from_str_lossy(agent_id).system_prompt()
}

/// Merge the user's question with live status data for the agent.
///
/// Without status the message is returned unchanged.
pub fn build_prompt(agent: AgentId, user_message: &str, status: Option<&Value>) -> String {
    let Some(status) = status else {
        return user_message.to_string();
    };

    let data = serde_json::to_string_pretty(status).unwrap_or_else(|_| status.to_string());
    format!(
        "{user_message}\n\n\
         Current {name} data from the factory backend:\n\
         ```json\n{data}\n```\n\n\
         Ground your answer in this live data. If it does not cover the question, say so instead of guessing.",
        name = agent.name(),
    )
}

/// Reduce visible messages to the `{role, content}` pairs language models accept
pub fn format_conversation_history(messages: &[Message]) -> Vec<HistoryEntry> {
    messages
        .iter()
        .map(|message| HistoryEntry::new(message.role, message.content.clone()))
        .collect()
}

#[derive(Serialize)]
struct TranscriptContext<'a> {
    system: &'a str,
    history: &'a [HistoryEntry],
    prompt: &'a str,
}

/// Render a single-string `Human:`/`Assistant:` transcript for text-generation endpoints
pub fn render_transcript(
    system: &str,
    history: &[HistoryEntry],
    prompt: &str,
) -> Result<String, TeraError> {
    let context = TranscriptContext {
        system,
        history,
        prompt,
    };
    Ok(load_prompt(TRANSCRIPT_TEMPLATE, &context)?.trim_end().to_string())
}
