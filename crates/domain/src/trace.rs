use serde::Serialize;

/// Structured trace events emitted across all `agentrt` crates. Every
/// variant is logged at `info` as a single JSON blob under the
/// `trace_event` field so a log pipeline can index on `event` without
/// parsing free-form messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AgentCreated {
        agent_id: String,
        template_id: String,
        provider: String,
        model: String,
    },
    AgentClosed {
        agent_id: String,
    },
    TurnStepStarted {
        agent_id: String,
        step: u64,
    },
    TurnStepCompleted {
        agent_id: String,
        step: u64,
        tool_calls: usize,
        duration_ms: u64,
    },
    ModelRequest {
        agent_id: String,
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    },
    ModelRetried {
        agent_id: String,
        attempt: u32,
        reason: String,
    },
    ToolDispatched {
        agent_id: String,
        call_id: String,
        tool_name: String,
    },
    ToolCompleted {
        agent_id: String,
        call_id: String,
        tool_name: String,
        duration_ms: u64,
        failed: bool,
    },
    MiddlewareRejected {
        agent_id: String,
        stage: String,
        reason: String,
    },
    SubscriberDropped {
        agent_id: String,
        channel: String,
    },
    RestartResumed {
        agent_id: String,
        strategy: String,
        pending_tool_calls: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agentrt_event");
    }
}
