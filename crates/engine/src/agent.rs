//! The `Agent` turn state machine: one agent drives at most one turn at a
//! time, protected by a single reader-writer lock over its mutable state
//! (messages, tool records, status) per the per-agent single-turn
//! invariant.

use crate::config::RuntimeConfig;
use crate::factory::{ProviderFactory, SandboxFactory};
use crate::registry::TemplateRegistry;
use agentrt_domain::{
    AgentId, AgentState, AgentStatus, Bookmark, Breakpoint, Channel, Event, Message, Result, RouterIntent, Sandbox,
    Store, ToolCallRecord, ToolCallState, TraceEvent,
};
use agentrt_eventbus::{EventBus, SubscribeOpts, Subscription};
use agentrt_middleware::MiddlewareStack;
use agentrt_providers::{LlmProvider, Router};
use agentrt_skills::{CommandExecutor, SkillRegistry};
use agentrt_tools::{ToolExecutor, ToolHandle, ToolRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a restart handles a `ToolCallRecord` left mid-flight (state ∈
/// {queued, executing}) by a prior process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategy {
    /// Mark the record failed, synthesize an error tool-result if one is
    /// missing, then continue as if the tool had reported failure.
    Crash,
    /// Leave the agent in `Ready` until an external decision resolves the
    /// pending call.
    Manual,
}

/// Read-mostly resources shared across every agent in the process. Safe
/// for concurrent use by many agents; their mutating operations
/// (registration) happen at startup.
pub struct RuntimeDeps {
    pub templates: Arc<TemplateRegistry>,
    pub tool_registry: Arc<ToolRegistry>,
    pub middleware: Arc<MiddlewareStack>,
    pub store: Arc<dyn Store>,
    pub skills: Option<Arc<SkillRegistry>>,
    pub commands: Option<Arc<CommandExecutor>>,
    pub router: Option<Arc<Router>>,
    pub provider_factory: Arc<dyn ProviderFactory>,
    pub sandbox_factory: Arc<dyn SandboxFactory>,
    pub config: RuntimeConfig,
}

pub(crate) struct AgentConfig {
    pub system_prompt: String,
    pub model: agentrt_domain::ModelConfig,
    pub streaming: bool,
    pub max_tokens_default: u32,
    pub max_tool_loops: u64,
    pub chat_poll_interval: Duration,
    pub resume_strategy: ResumeStrategy,
}

pub(crate) struct AgentDeps {
    pub store: Arc<dyn Store>,
    pub sandbox: Arc<dyn Sandbox>,
    pub provider: Arc<dyn LlmProvider>,
    pub tool_executor: Arc<ToolExecutor>,
    pub middleware: Arc<MiddlewareStack>,
    pub bus: Arc<EventBus>,
    pub skills: Option<Arc<SkillRegistry>>,
    pub commands: Option<Arc<CommandExecutor>>,
}

pub(crate) struct Inner {
    pub status: AgentStatus,
    pub messages: Vec<Message>,
    pub tool_records: Vec<ToolCallRecord>,
}

pub struct ChatResult {
    pub status: AgentStatus,
    pub text: String,
    pub last_bookmark: Bookmark,
}

pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) config: AgentConfig,
    pub(crate) deps: AgentDeps,
    /// Resolved tool subset for this agent's life, sorted once at create
    /// time for Tools Manual determinism.
    pub(crate) tools: Vec<ToolHandle>,
    pub(crate) inner: RwLock<Inner>,
    pub(crate) cancel: RwLock<Option<CancellationToken>>,
}

impl Agent {
    /// Validates the template, resolves the model (via the router when
    /// present), creates the agent's exclusive sandbox, instantiates its
    /// provider, loads persisted state, and runs every middleware's
    /// `on_agent_start` hook. A failure in any of these aborts creation.
    pub async fn create(
        id: AgentId,
        template_id: &str,
        router_intent: Option<RouterIntent>,
        resume_strategy: ResumeStrategy,
        deps: &RuntimeDeps,
    ) -> Result<Arc<Self>> {
        let template = deps.templates.get(template_id)?;

        let model = match (&deps.router, router_intent) {
            (Some(router), Some(intent)) => router.select_model(&intent)?,
            _ => template.model.clone(),
        };

        let provider = deps.provider_factory.create(&model)?;
        let sandbox = deps.sandbox_factory.create(&id)?;

        // Merge middleware-contributed tools before resolving this agent's
        // subset; name collisions favor the middleware's tool.
        for tool in deps.middleware.contributed_tools() {
            deps.tool_registry.register(tool);
        }

        let tool_names = if template.tool_names.is_empty() {
            deps.tool_registry.all().iter().map(|t| t.name().to_string()).collect()
        } else {
            template.tool_names.clone()
        };
        let mut tools = deps.tool_registry.subset(&tool_names)?;
        tools.sort_by(|a, b| a.name().cmp(b.name()));

        let messages = deps.store.load_messages(id.as_str()).await?;
        let tool_records = deps.store.load_tool_call_records(id.as_str()).await?;

        let tool_executor = Arc::new(
            ToolExecutor::new(deps.tool_registry.clone())
                .with_concurrency(deps.config.tool_concurrency)
                .with_default_timeout(deps.config.tool_timeout()),
        );

        let agent = Arc::new(Self {
            id: id.clone(),
            config: AgentConfig {
                system_prompt: template.system_prompt.clone(),
                model: model.clone(),
                streaming: deps.config.streaming,
                max_tokens_default: deps.config.max_tokens_default,
                max_tool_loops: deps.config.max_tool_loops,
                chat_poll_interval: deps.config.chat_poll_interval(),
                resume_strategy,
            },
            deps: AgentDeps {
                store: deps.store.clone(),
                sandbox,
                provider,
                tool_executor,
                middleware: deps.middleware.clone(),
                bus: Arc::new(EventBus::new()),
                skills: deps.skills.clone(),
                commands: deps.commands.clone(),
            },
            tools,
            inner: RwLock::new(Inner {
                status: AgentStatus::default(),
                messages,
                tool_records,
            }),
            cancel: RwLock::new(None),
        });

        agent.deps.middleware.on_agent_start(id.as_str()).await?;
        agent.resume_pending_tool_calls().await?;

        TraceEvent::AgentCreated {
            agent_id: id.as_str().to_string(),
            template_id: template_id.to_string(),
            provider: agent.deps.provider.provider_id().to_string(),
            model: model.model,
        }
        .emit();

        Ok(agent)
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn status(&self) -> AgentStatus {
        self.inner.read().status.clone()
    }

    /// Transitions `Ready -> Working` under the write lock and spawns the
    /// turn task. If already `Working`, returns immediately without
    /// starting a new turn -- at-most-one-turn concurrency is an
    /// invariant, not a race to be retried.
    pub async fn send(self: &Arc<Self>, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let rendered = match &self.deps.commands {
            Some(commands) if text.starts_with('/') => {
                commands.dispatch(&text, self.deps.provider.capabilities(), self.deps.sandbox.as_ref()).await?
            }
            _ => text,
        };
        let message = Message::user(rendered);
        let started = {
            let mut inner = self.inner.write();
            if inner.status.is_working() {
                false
            } else {
                inner.status.state = AgentState::Working;
                inner.status.breakpoint = Breakpoint::PreModel;
                inner.messages.push(message);
                true
            }
        };
        if !started {
            return Ok(());
        }

        self.persist_messages().await?;
        self.deps.bus.emit(Channel::Monitor, Event::StateChanged { state: "working".into() });

        let cancel = CancellationToken::new();
        *self.cancel.write() = Some(cancel.clone());

        let this = self.clone();
        tokio::spawn(async move { this.run_turn(cancel).await });
        Ok(())
    }

    /// Calls `send`, then polls `status()` until `Ready`, returning the
    /// last assistant text block. An external `cancel()` call while this
    /// is polling unblocks it promptly, since the same cancellation token
    /// drives the in-flight turn back to `Ready`.
    pub async fn chat(self: &Arc<Self>, text: impl Into<String>) -> Result<ChatResult> {
        self.send(text).await?;
        loop {
            let status = self.status();
            if !status.is_working() {
                return Ok(ChatResult {
                    text: self.last_assistant_text(),
                    last_bookmark: Bookmark::new(self.deps.bus.cursor()),
                    status,
                });
            }
            tokio::time::sleep(self.config.chat_poll_interval).await;
        }
    }

    /// Cancels the in-flight turn, if any. Propagates into the provider
    /// stream, the tool executor, and any middleware decision wait; any
    /// assistant message already appended remains, and any pending tool
    /// call is marked failed with reason CANCELLED.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.read().as_ref() {
            token.cancel();
        }
    }

    pub fn subscribe(&self, channels: &[Channel], opts: SubscribeOpts) -> Subscription {
        self.deps.bus.subscribe(channels, opts)
    }

    pub fn unsubscribe(&self, subscription_id: u64) {
        self.deps.bus.unsubscribe(subscription_id);
    }

    /// Runs every middleware's `on_agent_stop` hook and disposes the
    /// sandbox. Guaranteed on every exit path by callers.
    pub async fn close(&self) {
        self.deps.middleware.on_agent_stop(self.id.as_str()).await;
        self.deps.sandbox.dispose().await;
        TraceEvent::AgentClosed { agent_id: self.id.as_str().to_string() }.emit();
    }

    fn last_assistant_text(&self) -> String {
        self.inner
            .read()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == agentrt_domain::Role::Assistant)
            .map(|m| m.extract_all_text())
            .unwrap_or_default()
    }

    pub(crate) async fn persist_messages(&self) -> Result<()> {
        let messages = self.inner.read().messages.clone();
        self.deps.store.save_messages(self.id.as_str(), &messages).await
    }

    pub(crate) async fn persist_tool_records(&self) -> Result<()> {
        let records = self.inner.read().tool_records.clone();
        self.deps.store.save_tool_call_records(self.id.as_str(), &records).await
    }

    pub(crate) fn set_breakpoint(&self, breakpoint: Breakpoint, label: &str) {
        self.inner.write().status.breakpoint = breakpoint;
        self.deps.bus.emit(Channel::Monitor, Event::BreakpointChanged { breakpoint: label.into() });
    }

    pub(crate) fn transition_tool_call(&self, call_id: &str, state: ToolCallState) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.tool_records.iter_mut().find(|r| r.id == call_id) {
            record.transition(state);
        }
    }

    pub(crate) fn complete_tool_call(&self, call_id: &str, output: &str) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.tool_records.iter_mut().find(|r| r.id == call_id) {
            record.complete(output);
        }
    }

    pub(crate) async fn fail_tool_call(&self, call_id: &str, error: &str) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if let Some(record) = inner.tool_records.iter_mut().find(|r| r.id == call_id) {
                record.fail(error);
            }
        }
        self.persist_tool_records().await
    }

    /// Surfaces any `ToolCallRecord` left mid-flight by a prior process to
    /// the configured resume strategy.
    async fn resume_pending_tool_calls(self: &Arc<Self>) -> Result<()> {
        let pending_ids: Vec<String> = {
            let inner = self.inner.read();
            inner.tool_records.iter().filter(|r| r.is_pending_after_restart()).map(|r| r.id.clone()).collect()
        };
        if pending_ids.is_empty() {
            return Ok(());
        }

        if self.config.resume_strategy == ResumeStrategy::Manual {
            TraceEvent::RestartResumed {
                agent_id: self.id.as_str().to_string(),
                strategy: "manual".into(),
                pending_tool_calls: pending_ids.len(),
            }
            .emit();
            return Ok(());
        }

        let mut synthesized = Vec::new();
        {
            let mut inner = self.inner.write();
            for id in &pending_ids {
                let has_result = inner.messages.iter().any(|m| {
                    m.content
                        .iter()
                        .any(|b| matches!(b, agentrt_domain::ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == id))
                });
                if let Some(record) = inner.tool_records.iter_mut().find(|r| &r.id == id) {
                    record.fail("CANCELLED: interrupted by restart");
                }
                if !has_result {
                    synthesized.push(agentrt_domain::ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: "tool call interrupted by restart".into(),
                        is_error: true,
                    });
                }
            }
            if !synthesized.is_empty() {
                inner.messages.push(Message::tool_results(synthesized));
            }
        }

        TraceEvent::RestartResumed {
            agent_id: self.id.as_str().to_string(),
            strategy: "crash".into(),
            pending_tool_calls: pending_ids.len(),
        }
        .emit();

        self.persist_tool_records().await?;
        self.persist_messages().await?;
        Ok(())
    }
}
