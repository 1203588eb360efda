use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use cliclack::{input, spinner};
use console::style;
use tracing::debug;

use mas_chat::config::Settings;
use mas_chat::conversation::{Conversation, Rejection, SendOutcome};
use mas_chat::models::agent::AgentId;

use crate::render;
use crate::transcript;

/// What the user typed at the session prompt
#[derive(Debug, PartialEq, Eq)]
enum SessionInput {
    Exit,
    Help,
    ListAgents,
    SwitchAgent(Result<AgentId, String>),
    Message(String),
}

fn parse_input(text: &str) -> SessionInput {
    let text = text.trim();
    if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("/exit") {
        return SessionInput::Exit;
    }
    if text == "/?" || text.eq_ignore_ascii_case("/help") {
        return SessionInput::Help;
    }
    if text.eq_ignore_ascii_case("/agents") {
        return SessionInput::ListAgents;
    }
    if let Some(rest) = text.strip_prefix("/agent") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let id = rest.trim();
            return SessionInput::SwitchAgent(AgentId::from_str(id).map_err(|_| id.to_string()));
        }
    }
    SessionInput::Message(text.to_string())
}

fn print_help() {
    println!("Commands:");
    println!("/agent <id> - Talk to another agent");
    println!("/agents - List the available agents");
    println!("/? - Display this help message");
    println!("exit - End the session");
}

fn report_rejection(rejection: Rejection) {
    match rejection {
        Rejection::EmptyInput => {}
        Rejection::Busy => println!("{}", style("Still waiting for the previous reply").yellow()),
    }
}

/// Run one turn and print the outcome
async fn send_turn(conversation: &Conversation, agent: AgentId, text: &str, stream: bool) -> Result<()> {
    if stream {
        println!("{}", style(agent.name()).dim());
        let outcome = conversation
            .send_streaming(agent, text, |chunk, done| {
                if done {
                    println!("\n");
                } else {
                    print!("{chunk}");
                    let _ = io::stdout().flush();
                }
            })
            .await;

        match outcome {
            SendOutcome::Completed(message) if message.is_error => render::print_message(&message),
            SendOutcome::Completed(_) => Ok(()),
            SendOutcome::Rejected(rejection) => {
                report_rejection(rejection);
                Ok(())
            }
        }
    } else {
        let spin = spinner();
        spin.start("awaiting reply");
        let outcome = conversation.send(agent, text).await;
        spin.stop("");

        match outcome {
            SendOutcome::Completed(message) => render::print_message(&message),
            SendOutcome::Rejected(rejection) => {
                report_rejection(rejection);
                Ok(())
            }
        }
    }
}

pub async fn run_session(
    settings: &Settings,
    mut agent: AgentId,
    stream: bool,
    transcript_path: Option<PathBuf>,
) -> Result<()> {
    let conversation = Conversation::from_settings(settings).context("Failed to start session")?;

    if let Some(path) = &transcript_path {
        let messages = transcript::read_messages(path)?;
        if !messages.is_empty() {
            println!("{}", style(format!("Resumed {} messages from {}", messages.len(), path.display())).dim());
        }
        conversation.restore(messages);
    }

    println!(
        "{} {}",
        style(format!("Talking to the {}", agent.name())).bold(),
        style("- type \"exit\" to end the session, /? for help").dim()
    );
    println!();

    loop {
        let text: String = input(format!("{} >", agent.name()))
            .placeholder("")
            .interact()?;

        match parse_input(&text) {
            SessionInput::Exit => break,
            SessionInput::Help => print_help(),
            SessionInput::ListAgents => render::print_agents(),
            SessionInput::SwitchAgent(Ok(next)) => {
                agent = next;
                println!("{}", style(format!("Now talking to the {}", agent.name())).bold());
            }
            SessionInput::SwitchAgent(Err(unknown)) => {
                println!("{}", style(format!("Unknown agent '{unknown}', try /agents")).yellow());
            }
            SessionInput::Message(text) => {
                send_turn(&conversation, agent, &text, stream).await?;
                if let Some(path) = &transcript_path {
                    transcript::persist_messages(path, &conversation.messages())?;
                    debug!(path = %path.display(), "transcript saved");
                }
            }
        }
    }
    Ok(())
}

pub async fn ask(settings: &Settings, agent: AgentId, message: &str, stream: bool) -> Result<()> {
    let conversation = Conversation::from_settings(settings).context("Failed to set up chat")?;
    send_turn(&conversation, agent, message, stream).await
}
