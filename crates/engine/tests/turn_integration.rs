//! Drives a full `Agent` through `create` -> `chat` with a fake provider,
//! store, and sandbox: one step that calls a tool, then one step that
//! finishes with plain text. Covers the breakpoint walk, sequential tool
//! dispatch, and persistence without a real model or sandbox backend.

use agentrt_domain::{
    AgentId, BlockDelta, BlockKind, BoxStream, ContentBlock, ExecOpts, ExecOutput, GlobOpts, LlmCapabilities,
    Message, ModelConfig, NormalizedChunk, Result, Sandbox, Store, TemplateDefinition, ToolCallRecord,
};
use agentrt_engine::{Agent, ProviderFactory, ResumeStrategy, RuntimeConfig, RuntimeDeps, SandboxFactory, TemplateRegistry};
use agentrt_middleware::MiddlewareStack;
use agentrt_providers::{ChatOptions, ChatResponse, LlmProvider};
use agentrt_tools::{Tool, ToolContext, ToolOutcome, ToolRegistry};
use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct EchoTool {
    schema: Value,
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echoes its input back as the result"
    }
    fn input_schema(&self) -> &Value {
        &self.schema
    }
    fn prompt(&self) -> &str {
        "Call with {\"text\": <string>} to echo it back."
    }
    async fn call(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        Ok(ToolOutcome::ok(input.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string()))
    }
}

/// Replies with a tool-use block on its first call, then a plain-text
/// completion on every call after.
struct FakeProvider {
    calls: AtomicUsize,
    capabilities: LlmCapabilities,
}

impl FakeProvider {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0), capabilities: LlmCapabilities { tool_calling: true, streaming: true, ..Default::default() } }
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn stream(&self, _messages: &[Message], _opts: &ChatOptions) -> Result<BoxStream<'static, Result<NormalizedChunk>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Result<NormalizedChunk>> = if call == 0 {
            vec![
                Ok(NormalizedChunk::BlockStart { index: 0, kind: BlockKind::ToolUse { id: "call-1".into(), name: "echo".into() } }),
                Ok(NormalizedChunk::BlockDelta { index: 0, delta: BlockDelta::JsonArgsDelta { partial_json: "{\"text\":\"hi\"}".into() } }),
                Ok(NormalizedChunk::BlockStop { index: 0 }),
            ]
        } else {
            vec![
                Ok(NormalizedChunk::BlockStart { index: 0, kind: BlockKind::Text }),
                Ok(NormalizedChunk::BlockDelta { index: 0, delta: BlockDelta::TextDelta { text: "done: hi".into() } }),
                Ok(NormalizedChunk::BlockStop { index: 0 }),
            ]
        };
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn complete(&self, _messages: &[Message], _opts: &ChatOptions) -> Result<ChatResponse> {
        unimplemented!("this agent is configured for streaming")
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct FakeStore {
    messages: Mutex<HashMap<String, Vec<Message>>>,
    records: Mutex<HashMap<String, Vec<ToolCallRecord>>>,
}

#[async_trait]
impl Store for FakeStore {
    async fn save_messages(&self, agent_id: &str, messages: &[Message]) -> Result<()> {
        self.messages.lock().insert(agent_id.to_string(), messages.to_vec());
        Ok(())
    }
    async fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>> {
        Ok(self.messages.lock().get(agent_id).cloned().unwrap_or_default())
    }
    async fn save_tool_call_records(&self, agent_id: &str, records: &[ToolCallRecord]) -> Result<()> {
        self.records.lock().insert(agent_id.to_string(), records.to_vec());
        Ok(())
    }
    async fn load_tool_call_records(&self, agent_id: &str) -> Result<Vec<ToolCallRecord>> {
        Ok(self.records.lock().get(agent_id).cloned().unwrap_or_default())
    }
    async fn save_info(&self, _agent_id: &str, _info: &Value) -> Result<()> {
        Ok(())
    }
}

struct FakeSandbox;

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn exec(&self, _cmd: &str, _opts: ExecOpts) -> Result<ExecOutput> {
        unimplemented!()
    }
    async fn read(&self, _path: &str) -> Result<String> {
        unimplemented!()
    }
    async fn write(&self, _path: &str, _content: &str) -> Result<()> {
        unimplemented!()
    }
    async fn glob(&self, _pattern: &str, _opts: GlobOpts) -> Result<Vec<String>> {
        unimplemented!()
    }
    fn work_dir(&self) -> &str {
        "/tmp"
    }
    async fn dispose(&self) {}
}

struct FakeProviderFactory;
impl ProviderFactory for FakeProviderFactory {
    fn create(&self, _model: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        Ok(Arc::new(FakeProvider::new()))
    }
}

struct FakeSandboxFactory;
impl SandboxFactory for FakeSandboxFactory {
    fn create(&self, _agent_id: &AgentId) -> Result<Arc<dyn Sandbox>> {
        Ok(Arc::new(FakeSandbox))
    }
}

fn runtime_deps() -> RuntimeDeps {
    let templates = Arc::new(TemplateRegistry::new());
    templates.register(TemplateDefinition {
        id: "assistant".into(),
        system_prompt: "you are a terse assistant".into(),
        model: ModelConfig { provider: "fake".into(), model: "fake-1".into(), temperature: None, max_tokens: None },
        tool_names: vec!["echo".into()],
        runtime_hints: Value::Null,
    });

    let tool_registry = Arc::new(ToolRegistry::new());
    tool_registry.register(Arc::new(EchoTool { schema: serde_json::json!({"type": "object"}) }));

    RuntimeDeps {
        templates,
        tool_registry,
        middleware: Arc::new(MiddlewareStack::new(vec![])),
        store: Arc::new(FakeStore::default()),
        skills: None,
        commands: None,
        router: None,
        provider_factory: Arc::new(FakeProviderFactory),
        sandbox_factory: Arc::new(FakeSandboxFactory),
        config: RuntimeConfig::default(),
    }
}

#[tokio::test]
async fn chat_drives_a_tool_round_trip_then_returns_final_text() {
    let deps = runtime_deps();
    let agent = Agent::create(AgentId::new("agent-1"), "assistant", None, ResumeStrategy::Crash, &deps).await.unwrap();

    let result = agent.chat("hi").await.unwrap();

    assert_eq!(result.text, "done: hi");
    assert!(!result.status.is_working());
    assert_eq!(result.status.step_count, 2);
}

#[tokio::test]
async fn unknown_template_fails_creation() {
    let deps = runtime_deps();
    let err = Agent::create(AgentId::new("agent-2"), "missing-template", None, ResumeStrategy::Crash, &deps).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn tool_result_is_recorded_in_the_persisted_message_log() {
    let deps = runtime_deps();
    let store = deps.store.clone();
    let agent = Agent::create(AgentId::new("agent-3"), "assistant", None, ResumeStrategy::Crash, &deps).await.unwrap();

    agent.chat("hi").await.unwrap();

    let messages = store.load_messages("agent-3").await.unwrap();
    let has_tool_result = messages.iter().any(|m| {
        m.content.iter().any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, is_error, .. } if tool_use_id == "call-1" && !is_error))
    });
    assert!(has_tool_result, "expected a successful tool_result block for call-1 in the persisted log");
}

#[tokio::test]
async fn cancel_before_the_turn_starts_leaves_the_agent_ready() {
    let deps = runtime_deps();
    let agent = Agent::create(AgentId::new("agent-4"), "assistant", None, ResumeStrategy::Crash, &deps).await.unwrap();

    agent.cancel();
    assert!(!agent.status().is_working());
}

fn mid_flight_record(state: agentrt_domain::ToolCallState) -> ToolCallRecord {
    ToolCallRecord {
        id: "call-pending".into(),
        name: "echo".into(),
        input: serde_json::json!({"text": "stale"}),
        state,
        result: None,
        error: None,
        started_at: None,
        completed_at: None,
        duration_ms: None,
        audit_trail: vec![],
    }
}

#[tokio::test]
async fn crash_resume_fails_the_pending_record_and_synthesizes_a_result() {
    let deps = runtime_deps();
    deps.store
        .save_tool_call_records("agent-5", &[mid_flight_record(agentrt_domain::ToolCallState::Executing)])
        .await
        .unwrap();

    let agent = Agent::create(AgentId::new("agent-5"), "assistant", None, ResumeStrategy::Crash, &deps).await.unwrap();
    assert!(!agent.status().is_working());

    let records = deps.store.load_tool_call_records("agent-5").await.unwrap();
    assert_eq!(records[0].state, agentrt_domain::ToolCallState::Failed);

    let messages = deps.store.load_messages("agent-5").await.unwrap();
    let synthesized = messages.iter().any(|m| {
        m.content.iter().any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, is_error, .. } if tool_use_id == "call-pending" && *is_error))
    });
    assert!(synthesized, "expected a synthesized error tool_result for the interrupted call");
}

#[tokio::test]
async fn manual_resume_leaves_the_pending_record_untouched() {
    let deps = runtime_deps();
    deps.store
        .save_tool_call_records("agent-6", &[mid_flight_record(agentrt_domain::ToolCallState::Queued)])
        .await
        .unwrap();

    Agent::create(AgentId::new("agent-6"), "assistant", None, ResumeStrategy::Manual, &deps).await.unwrap();

    let records = deps.store.load_tool_call_records("agent-6").await.unwrap();
    assert_eq!(records[0].state, agentrt_domain::ToolCallState::Queued);
}
