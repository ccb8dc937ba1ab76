use anyhow::Result;
use async_trait::async_trait;
use kindred_core::ChatMessage;

/// One completed model call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    /// Total tokens billed for the call (prompt + completion). Zero when
    /// the provider doesn't report usage.
    pub tokens_used: u64,
}

/// Chat-completion collaborator. Used for the conversational reply and,
/// with a distinct system prompt, for summarization and the behavior
/// classifiers.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Completion>;
}
