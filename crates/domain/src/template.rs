//! Agent templates: the static configuration resolved once at agent-create
//! time and never mutated for the life of the agent.

use serde::{Deserialize, Serialize};

/// The concrete provider + model an agent will drive, as resolved by the
/// router (or taken verbatim when no router is configured).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Registered at startup, looked up by id at agent-create time. Parsed from
/// a YAML-frontmatter Markdown file upstream of this crate; this type is
/// the parsed, validated result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: String,
    pub system_prompt: String,
    pub model: ModelConfig,
    #[serde(default)]
    pub tool_names: Vec<String>,
    #[serde(default)]
    pub runtime_hints: serde_json::Value,
}
