mod client;
mod structured;
mod types;

pub mod prompts;

pub use client::{LlmClient, LlmConfig};
pub use structured::{extract_json, request_structured};
pub use types::*;

use anyhow::Result;

/// Abstraction over the chat model collaborator.
///
/// The engine is generic over this so tests can script responses without
/// a live endpoint.
pub trait ChatBackend {
    fn model_name(&self) -> &str;

    async fn chat(&self, messages: Vec<Message>) -> Result<ChatResponse>;
}
