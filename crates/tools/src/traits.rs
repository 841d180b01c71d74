//! The `Tool` trait and its call/result shapes.

use agentrt_domain::Result;
use serde_json::Value;
use std::sync::Arc;

/// Context a tool executes with. Intentionally minimal: a tool only ever
/// sees the agent it's running inside of and its input, never the engine.
#[derive(Clone)]
pub struct ToolContext {
    pub agent_id: String,
    pub tool_call_id: String,
}

/// Outcome of one tool invocation. `success = false` is not an error in
/// the Rust sense -- it's a normal result the model reads back as a failed
/// tool call, distinct from the tool implementation itself erroring.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into(), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, output: String::new(), error: Some(error.into()) }
    }

    pub fn timeout() -> Self {
        Self::failed("TIMEOUT")
    }

    pub fn cancelled() -> Self {
        Self::failed("CANCELLED")
    }
}

/// A named, schema-described capability the model can invoke. Implementors
/// do their own input validation against `input_schema`; the executor only
/// enforces the concurrency cap and deadline.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON-schema-shaped description of the input map, advertised to the
    /// model alongside `name` and `description`.
    fn input_schema(&self) -> &Value;

    /// Free-form prose appended verbatim to the system prompt's "Tools
    /// Manual" section, alongside the structured schema.
    fn prompt(&self) -> &str {
        ""
    }

    async fn call(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutcome>;
}

pub type ToolHandle = Arc<dyn Tool>;
