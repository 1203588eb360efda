use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::agent::AgentId;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> u64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Keep ids handed out from now on above `id`, e.g. after loading a saved transcript
pub(crate) fn reserve_ids_through(id: u64) {
    NEXT_MESSAGE_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
}

fn display_time() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the visible conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_real_data: Option<bool>,
}

impl Message {
    fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Message {
            id: next_message_id(),
            role,
            content: content.into(),
            timestamp: display_time(),
            agent: None,
            is_error: false,
            data_source: None,
            has_real_data: None,
        }
    }

    /// Create a new user message stamped with the current time
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message stamped with the current time
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant entry standing in for a reply that failed
    pub fn error<S: Into<String>>(agent: AgentId, content: S) -> Self {
        let mut message = Self::assistant(content).with_agent(agent);
        message.is_error = true;
        message
    }

    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Record where the reply came from and whether live backend data was used
    pub fn with_data_source<S: Into<String>>(mut self, source: S, has_real_data: bool) -> Self {
        self.data_source = Some(source.into());
        self.has_real_data = Some(has_real_data);
        self
    }
}

/// A message reduced to what language-model endpoints accept as history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
