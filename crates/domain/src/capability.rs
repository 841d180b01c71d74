use serde::{Deserialize, Serialize};

/// What a provider advertises about the model behind it. The router and
/// the command dispatcher consult this before routing work to a model;
/// neither inspects the provider's name or wire dialect directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub tool_calling: bool,
    pub system_prompt: bool,
    pub streaming: bool,
    pub vision: bool,
    pub audio: bool,
    pub video: bool,
    pub reasoning: bool,
    pub prompt_cache: bool,
    pub json_mode: bool,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_min_tokens: Option<u32>,
    pub tool_calling_format: ToolCallingFormat,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            tool_calling: false,
            system_prompt: true,
            streaming: false,
            vision: false,
            audio: false,
            video: false,
            reasoning: false,
            prompt_cache: false,
            json_mode: false,
            max_tokens: 4096,
            cache_min_tokens: None,
            tool_calling_format: ToolCallingFormat::Anthropic,
        }
    }
}

/// Which wire dialect a provider's tool-call encoding follows. Drives which
/// branch of the chunk assembler and tool-result translator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallingFormat {
    Anthropic,
    Openai,
    Gemini,
}
