//! These models represent the objects passed between the conversation, the prompt
//! formatter and the chat providers.
//!
//! Providers each speak their own wire format; they convert from the internal
//! `HistoryEntry` list at the edge and never leak their shapes back into the
//! conversation.
pub mod agent;
pub mod message;
