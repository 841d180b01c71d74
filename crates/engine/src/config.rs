//! Process-wide runtime tunables shared by every agent built from one
//! [`RuntimeDeps`](crate::RuntimeDeps): the turn loop's tool-round bound, the
//! tool executor's concurrency cap and per-call deadline, the default
//! completion length, and how often `chat` polls for completion. Each field
//! defaults to the value this crate used before it was made configurable, so
//! an embedder that never touches `RuntimeConfig` sees no behavior change.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on `max_tokens` sent to the model when a template or
    /// router selection doesn't specify one.
    #[serde(default = "d_max_tokens_default")]
    pub max_tokens_default: u32,
    /// Whether agents call the provider's `stream` or `complete` path.
    #[serde(default = "d_streaming")]
    pub streaming: bool,
    /// How often `Agent::chat` polls `status()` while a turn is in flight.
    #[serde(default = "d_chat_poll_interval_ms")]
    pub chat_poll_interval_ms: u64,
    /// Hard bound on model-step/tool-dispatch round trips within one turn.
    #[serde(default = "d_max_tool_loops")]
    pub max_tool_loops: u64,
    /// Concurrent tool calls permitted process-wide.
    #[serde(default = "d_tool_concurrency")]
    pub tool_concurrency: usize,
    /// Per-call deadline applied when a tool call doesn't set its own.
    #[serde(default = "d_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Upper bound on retries for a 429/5xx model request, applied by the
    /// provider adapter with exponential backoff between attempts.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
}

impl RuntimeConfig {
    pub fn chat_poll_interval(&self) -> Duration {
        Duration::from_millis(self.chat_poll_interval_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tokens_default: d_max_tokens_default(),
            streaming: d_streaming(),
            chat_poll_interval_ms: d_chat_poll_interval_ms(),
            max_tool_loops: d_max_tool_loops(),
            tool_concurrency: d_tool_concurrency(),
            tool_timeout_secs: d_tool_timeout_secs(),
            max_retries: d_max_retries(),
        }
    }
}

// ─── Default value helpers (serde) ──────────────────────────────────

fn d_max_tokens_default() -> u32 {
    4096
}

fn d_streaming() -> bool {
    true
}

fn d_chat_poll_interval_ms() -> u64 {
    50
}

fn d_max_tool_loops() -> u64 {
    25
}

fn d_tool_concurrency() -> usize {
    3
}

fn d_tool_timeout_secs() -> u64 {
    60
}

fn d_max_retries() -> u32 {
    3
}
