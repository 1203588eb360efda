pub mod anthropic;
pub mod base;
pub mod factory;
pub mod huggingface;
pub mod relay;
pub mod sse;

#[cfg(test)]
pub mod mock;
