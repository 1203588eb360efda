pub mod backend;
pub mod chat;
pub mod config;
pub mod watch;
