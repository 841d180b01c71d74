pub mod anthropic;
pub mod openai_compat;
pub mod router;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::Router;
pub use traits::{ChatOptions, ChatResponse, LlmProvider, ToolSchema};
