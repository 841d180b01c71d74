use agentrt_domain::{LlmCapabilities, Message, NormalizedChunk, Result};
use serde_json::Value;

/// A tool schema advertised to the model in a request.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub tools: Vec<ToolSchema>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Carried through purely for tracing -- stamped on `ModelRetried` when
    /// a request is retried.
    pub agent_id: String,
    /// Upper bound on retries for a 429/5xx response. `0` disables retries.
    pub max_retries: u32,
}

/// A non-streaming chat result, used when the engine runs in
/// non-streaming mode and calls [`LlmProvider::complete`] directly.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<agentrt_domain::Usage>,
}

/// Wire-level adapter to one LLM API, hiding its serialization behind a
/// common shape. Every implementation translates its own dialect onto
/// [`NormalizedChunk`] so the engine's chunk assembler never branches on
/// provider identity.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open the API's streaming endpoint; return a lazy, finite,
    /// single-consumer sequence of normalized chunks.
    async fn stream(
        &self,
        messages: &[Message],
        opts: &ChatOptions,
    ) -> Result<agentrt_domain::BoxStream<'static, Result<NormalizedChunk>>>;

    /// Non-streaming completion, used when the agent is configured without
    /// streaming.
    async fn complete(&self, messages: &[Message], opts: &ChatOptions) -> Result<ChatResponse>;

    fn capabilities(&self) -> &LlmCapabilities;

    fn provider_id(&self) -> &str;
}
