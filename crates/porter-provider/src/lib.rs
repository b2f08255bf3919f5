pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAiProvider;

/// Black-box reply generator consulted by the conversation policy when
/// no stage rule matches. Implementations must be cheap to clone behind
/// an `Arc` and safe to call concurrently.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// One prompt for the generator: a fixed system instruction, optional
/// conversation context, and the visitor's latest message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub context: Option<String>,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            context: None,
            user: user.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The user turn as sent to the upstream, with context folded in.
    pub fn user_turn(&self) -> String {
        match &self.context {
            Some(ctx) if !ctx.is_empty() => {
                format!("CONTEXT:\n{ctx}\n\nUSER: {}", self.user.trim())
            }
            _ => format!("CONTEXT:\n(none)\n\nUSER: {}", self.user.trim()),
        }
    }
}

/// Deterministic provider for tests: echoes the user message behind a
/// fixed prefix.
pub struct StubProvider;

#[async_trait]
impl ReplyProvider for StubProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        Ok(format!("[stub] {}", request.user.trim()))
    }
}
