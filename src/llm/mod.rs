//! Chat-model collaborator seam and tool-aware generation.

mod client;
mod runner;

pub use client::HttpChatClient;
pub use runner::ToolRunner;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::branch::ToolCallRecord;
use crate::error::ProviderResult;

/// Chat-completion collaborator seam.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for a prompt.
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> ProviderResult<String>;
}

/// The outcome of one tool-aware generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Final generated text.
    pub text: String,
    /// Tool calls executed during generation, in order.
    pub tool_calls: Vec<ToolCallRecord>,
}
