//! The conversation orchestrator.
//!
//! One [`Conversation`] owns the visible message list and runs each user turn
//! through status lookup, prompt building and the chat client, in that order.
//! Only one turn may be in flight at a time; a second submission while the first
//! is outstanding is rejected rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::backend::{BackendClient, StatusSource};
use crate::chat::{ChatClient, ChatReply};
use crate::config::Settings;
use crate::errors::ChatResult;
use crate::models::agent::AgentId;
use crate::models::message::{reserve_ids_through, HistoryEntry, Message};
use crate::prompt::{build_prompt, format_conversation_history};

/// Why a submission was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The assistant or error entry appended for this turn
    Completed(Message),
    Rejected(Rejection),
}

/// Clears the loading flag however the turn ends
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Conversation {
    status: Arc<dyn StatusSource>,
    chat: ChatClient,
    messages: RwLock<Arc<Vec<Message>>>,
    loading: AtomicBool,
}

impl Conversation {
    pub fn new(status: Arc<dyn StatusSource>, chat: ChatClient) -> Self {
        Self {
            status,
            chat,
            messages: RwLock::new(Arc::new(Vec::new())),
            loading: AtomicBool::new(false),
        }
    }

    /// Wire a backend client and the configured chat provider together
    pub fn from_settings(settings: &Settings) -> ChatResult<Self> {
        let backend = Arc::new(BackendClient::new(settings.backend.clone())?);
        let chat = ChatClient::new(settings.chat.clone(), Some(backend.clone()))?;
        Ok(Self::new(backend, chat))
    }

    pub fn chat(&self) -> &ChatClient {
        &self.chat
    }

    /// Snapshot of the conversation, oldest first
    pub fn messages(&self) -> Arc<Vec<Message>> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.restore(Vec::new());
    }

    /// Replace the conversation, e.g. with a transcript saved earlier
    pub fn restore(&self, messages: Vec<Message>) {
        if let Some(max_id) = messages.iter().map(|message| message.id).max() {
            reserve_ids_through(max_id);
        }
        *self.messages.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(messages);
    }

    fn append(&self, message: Message) {
        let mut current = self.messages.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(message);
        *current = Arc::new(next);
    }

    /// Gate a submission and record the user entry.
    /// Returns the history that preceded it, without error entries.
    fn begin(&self, input: &str) -> Result<(LoadingGuard<'_>, Vec<HistoryEntry>), Rejection> {
        if input.trim().is_empty() {
            return Err(Rejection::EmptyInput);
        }
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("send rejected, a reply is still pending");
            return Err(Rejection::Busy);
        }
        let guard = LoadingGuard(&self.loading);

        let prior: Vec<Message> = self
            .messages()
            .iter()
            .filter(|message| !message.is_error)
            .cloned()
            .collect();
        self.append(Message::user(input));

        Ok((guard, format_conversation_history(&prior)))
    }

    async fn lookup_status(&self, agent: AgentId) -> Option<Value> {
        match self.status.agent_status(agent).await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(%agent, error = %e, "continuing without live data");
                None
            }
        }
    }

    async fn respond(
        &self,
        agent: AgentId,
        input: &str,
        history: &[HistoryEntry],
        on_chunk: Option<&mut (dyn FnMut(&str, bool) + Send)>,
    ) -> ChatResult<Message> {
        // Missing credentials fail before anything goes over the wire
        self.chat.ensure_configured()?;

        let status = self.lookup_status(agent).await;
        let prompt = build_prompt(agent, input, status.as_ref());

        let reply: ChatReply = match on_chunk {
            Some(on_chunk) => {
                self.chat
                    .stream_chat_message_with(&prompt, agent, history, on_chunk)
                    .await?
            }
            None => self.chat.send_chat_message(&prompt, agent, history).await?,
        };

        let has_real_data = status.is_some();
        let source = if has_real_data {
            format!("factory backend (agent.status) via {}", reply.model)
        } else {
            reply.model.clone()
        };
        Ok(Message::assistant(reply.message)
            .with_agent(agent)
            .with_data_source(source, has_real_data))
    }

    async fn run(
        &self,
        agent: AgentId,
        input: &str,
        on_chunk: Option<&mut (dyn FnMut(&str, bool) + Send)>,
    ) -> SendOutcome {
        let (_loading, history) = match self.begin(input) {
            Ok(started) => started,
            Err(rejection) => return SendOutcome::Rejected(rejection),
        };

        let message = match self.respond(agent, input, &history, on_chunk).await {
            Ok(message) => message,
            Err(e) => {
                error!(%agent, error = %e, "chat request failed");
                Message::error(agent, e.user_message())
            }
        };
        self.append(message.clone());
        SendOutcome::Completed(message)
    }

    /// Run one user turn for `agent`
    pub async fn send(&self, agent: AgentId, input: &str) -> SendOutcome {
        self.run(agent, input, None).await
    }

    /// Like [`Conversation::send`], forwarding reply text to `on_chunk` as it arrives
    pub async fn send_streaming<F>(&self, agent: AgentId, input: &str, mut on_chunk: F) -> SendOutcome
    where
        F: FnMut(&str, bool) + Send,
    {
        self.run(agent, input, Some(&mut on_chunk)).await
    }
}
