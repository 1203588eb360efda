use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mas_chat::config::Settings;
use mas_chat::models::agent::AgentId;

mod commands;
mod render;
mod transcript;

#[derive(Parser)]
#[command(author, version, about = "Talk to the smart-factory agents from a terminal", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/mas-chat/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Agent to talk to
        #[arg(short, long, default_value_t = AgentId::Supervisory)]
        agent: AgentId,

        /// Print replies as they are generated
        #[arg(long)]
        stream: bool,

        /// JSONL file the conversation is resumed from and saved to
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Send a single message and print the reply
    Ask {
        message: String,

        #[arg(short, long, default_value_t = AgentId::Supervisory)]
        agent: AgentId,

        #[arg(long)]
        stream: bool,
    },

    /// Show the live status of one agent, or of the whole system
    Status { agent: Option<AgentId> },

    /// List active system alerts
    Alerts {
        #[arg(long)]
        severity: Option<String>,
    },

    /// Show performance metrics for an agent
    Metrics {
        agent: AgentId,

        /// Time range such as 1h or 24h
        #[arg(long)]
        range: Option<String>,
    },

    /// Ask an agent to carry out an action
    Action {
        agent: AgentId,
        action: String,

        /// Action parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },

    /// Print live updates pushed by the backend for an agent
    Watch { agent: AgentId },

    /// Check that the factory backend is reachable
    Health,

    /// Validate and print the active configuration
    Config,

    /// List the available agents
    Agents,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = match &cli.config {
        Some(path) => Settings::load(Some(path)),
        None => Settings::new(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Command::Chat {
            agent,
            stream,
            transcript,
        } => commands::chat::run_session(&settings, agent, stream, transcript).await,
        Command::Ask {
            message,
            agent,
            stream,
        } => commands::chat::ask(&settings, agent, &message, stream).await,
        Command::Status { agent } => commands::backend::status(&settings, agent).await,
        Command::Alerts { severity } => {
            commands::backend::alerts(&settings, severity.as_deref()).await
        }
        Command::Metrics { agent, range } => {
            commands::backend::metrics(&settings, agent, range.as_deref()).await
        }
        Command::Action {
            agent,
            action,
            params,
        } => commands::backend::action(&settings, agent, &action, params.as_deref()).await,
        Command::Watch { agent } => commands::watch::watch(&settings, agent).await,
        Command::Health => commands::backend::health(&settings).await,
        Command::Config => commands::config::show(&settings),
        Command::Agents => {
            render::print_agents();
            Ok(())
        }
    }
}
