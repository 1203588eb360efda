pub mod backend;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod transport;
