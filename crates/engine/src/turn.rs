//! The turn algorithm: one model step, walking
//! `PreModel -> StreamingModel -> (ToolPending -> PreTool -> ToolExecuting -> PostTool)* -> Done`,
//! looping back to `PreModel` whenever the assistant message carries tool
//! uses, until none remain or the loop bound is hit.

use crate::agent::Agent;
use crate::assembler::assemble_stream;
use crate::tools_manual::render_tools_manual;
use agentrt_domain::{AgentState, Breakpoint, Channel, ContentBlock, Error, Event, Message, Result, ToolCallRecord, ToolCallState, TraceEvent};
use agentrt_middleware::ModelCallRequest;
use agentrt_providers::{ChatOptions, ToolSchema};
use agentrt_skills::SkillInjector;
use agentrt_tools::{ExecuteRequest, ToolContext};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

impl Agent {
    pub(crate) async fn run_turn(self: Arc<Self>, cancel: CancellationToken) {
        let outcome = self.run_turn_inner(&cancel).await;
        if let Err(e) = &outcome {
            if !matches!(e, Error::Cancelled) {
                self.deps.bus.emit(Channel::Monitor, Event::Error { message: e.to_string() });
            }
        }

        {
            let mut inner = self.inner.write();
            inner.status.state = AgentState::Ready;
            inner.status.breakpoint = Breakpoint::Ready;
        }
        *self.cancel.write() = None;
        self.deps.bus.emit(Channel::Monitor, Event::StateChanged { state: "ready".into() });
    }

    async fn run_turn_inner(self: &Arc<Self>, cancel: &CancellationToken) -> Result<()> {
        let agent_id = self.id.as_str().to_string();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let step_start = Instant::now();
            let step = self.inner.read().status.step_count;
            TraceEvent::TurnStepStarted { agent_id: agent_id.clone(), step }.emit();

            self.set_breakpoint(Breakpoint::PreModel, "pre_model");

            let (system_prompt, skills_as_user_message) = self.build_system_prompt();
            let opts = ChatOptions {
                tools: self.tool_schemas(),
                system: Some(system_prompt),
                max_tokens: Some(self.config.model.max_tokens.unwrap_or(self.config.max_tokens_default)),
                temperature: self.config.model.temperature,
                agent_id: agent_id.clone(),
                max_retries: self.config.max_retries,
            };

            let mut messages_snapshot = self.inner.read().messages.clone();
            if let Some(skills_block) = skills_as_user_message {
                // No system channel to carry this in, so fold it into the
                // leading user turn instead of inserting a message that
                // would break user/assistant alternation.
                match messages_snapshot.first_mut() {
                    Some(first) if first.role == agentrt_domain::Role::User => {
                        first.content.insert(0, ContentBlock::text(skills_block));
                    }
                    _ => messages_snapshot.insert(0, Message::user(skills_block)),
                }
            }

            self.set_breakpoint(Breakpoint::StreamingModel, "streaming_model");

            let assistant_message = self.call_model(&agent_id, messages_snapshot, opts, cancel).await?;

            {
                let mut inner = self.inner.write();
                inner.messages.push(assistant_message.clone());
            }
            self.persist_messages().await?;

            let tool_uses: Vec<(String, String, serde_json::Value)> = assistant_message
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_uses.is_empty() {
                let step = {
                    let mut inner = self.inner.write();
                    inner.status.step_count += 1;
                    inner.status.step_count
                };
                self.deps.bus.emit(Channel::Progress, Event::Done { step, reason: "completed".into() });
                TraceEvent::TurnStepCompleted {
                    agent_id,
                    step,
                    tool_calls: 0,
                    duration_ms: step_start.elapsed().as_millis() as u64,
                }
                .emit();
                return Ok(());
            }

            self.set_breakpoint(Breakpoint::ToolPending, "tool_pending");
            let result_blocks = self.dispatch_tools(&agent_id, &tool_uses, cancel).await?;

            let step = {
                let mut inner = self.inner.write();
                inner.messages.push(Message::tool_results(result_blocks));
                inner.status.step_count += 1;
                inner.status.step_count
            };
            self.persist_messages().await?;

            TraceEvent::TurnStepCompleted {
                agent_id: agent_id.clone(),
                step,
                tool_calls: tool_uses.len(),
                duration_ms: step_start.elapsed().as_millis() as u64,
            }
            .emit();

            if step >= self.config.max_tool_loops {
                let limit = self.config.max_tool_loops;
                self.deps.bus.emit(
                    Channel::Monitor,
                    Event::Error { message: format!("tool loop limit reached ({limit} steps)") },
                );
                return Ok(());
            }
        }
    }

    /// Ensures the system prompt carries exactly one "Tools Manual"
    /// section and one skills overview block, both rebuilt fresh from the
    /// current tool/skill set rather than spliced into a persisted prompt.
    ///
    /// A provider with no dedicated system channel (`LlmCapabilities::system_prompt`
    /// is `false`) never sees the skills overview here; it comes back as the
    /// second element, for the caller to fold into the leading user turn
    /// instead.
    fn build_system_prompt(&self) -> (String, Option<String>) {
        let mut prompt = self.config.system_prompt.clone();
        let has_system_channel = self.deps.provider.capabilities().system_prompt;
        let mut skills_as_user_message = None;

        if let Some(registry) = &self.deps.skills {
            let skills_block = SkillInjector::new(registry.as_ref()).render_overview_block();
            if !skills_block.is_empty() {
                if has_system_channel {
                    prompt.push_str("\n\n");
                    prompt.push_str(&skills_block);
                } else {
                    skills_as_user_message = Some(skills_block);
                }
            }
        }

        let tools_manual = render_tools_manual(&self.tools);
        if !tools_manual.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tools_manual);
        }

        (prompt, skills_as_user_message)
    }

    fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema().clone(),
            })
            .collect()
    }

    /// Invokes the model through the middleware stack. In streaming mode
    /// the terminal handler assembles the normalized chunk stream; in
    /// non-streaming mode it calls `complete` directly.
    async fn call_model(
        &self,
        agent_id: &str,
        messages: Vec<Message>,
        opts: ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let streaming = self.config.streaming;
        let provider = self.deps.provider.clone();
        let bus = self.deps.bus.clone();
        let cancel_for_stream = cancel.clone();
        let opts_for_call = opts;

        let model_start = Instant::now();
        let req = ModelCallRequest { agent_id: agent_id.to_string(), messages, cancel: cancel.clone() };
        let produced = self
            .deps
            .middleware
            .run_model_call(req, move |req| {
                Box::pin(async move {
                    if streaming {
                        let chunk_stream = provider.stream(&req.messages, &opts_for_call).await?;
                        let (message, outcome) = assemble_stream(&bus, &cancel_for_stream, chunk_stream).await;
                        match outcome {
                            Ok(()) => Ok(vec![message]),
                            // A cancelled assembly still carries whatever the
                            // model had produced so far; let it flow through
                            // as the "completed" message and let the caller
                            // notice `cancel` is set to decide what to keep.
                            Err(Error::Cancelled) => Ok(vec![message]),
                            Err(e) => Err(e),
                        }
                    } else {
                        let response = provider.complete(&req.messages, &opts_for_call).await?;
                        Ok(vec![response.message])
                    }
                })
            })
            .await?;

        TraceEvent::ModelRequest {
            agent_id: agent_id.to_string(),
            provider: self.deps.provider.provider_id().to_string(),
            model: self.config.model.model.clone(),
            streaming,
            duration_ms: model_start.elapsed().as_millis() as u64,
            input_tokens: None,
            output_tokens: None,
        }
        .emit();

        let mut produced = produced;
        if produced.is_empty() {
            return Err(Error::Protocol("model call produced no message".into()));
        }
        let message = produced.remove(0);

        if cancel.is_cancelled() {
            // S5: keep the partial assistant block in the log rather than
            // discarding it -- push and persist it before the caller ever
            // sees `Cancelled`.
            self.inner.write().messages.push(message);
            self.persist_messages().await?;
            return Err(Error::Cancelled);
        }

        Ok(message)
    }

    /// Runs every extracted tool-use block through the middleware stack
    /// and the executor, strictly sequentially in encounter order: each
    /// toolUse must have exactly one matching toolResult before the next
    /// one starts, preserving deterministic side-effects on the shared
    /// sandbox.
    async fn dispatch_tools(
        self: &Arc<Self>,
        agent_id: &str,
        tool_uses: &[(String, String, serde_json::Value)],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentBlock>> {
        let mut result_blocks = Vec::with_capacity(tool_uses.len());

        for (call_id, tool_name, input) in tool_uses {
            if cancel.is_cancelled() {
                self.fail_tool_call(call_id, "CANCELLED").await?;
                return Err(Error::Cancelled);
            }

            {
                let mut inner = self.inner.write();
                inner.tool_records.push(ToolCallRecord::new(call_id.clone(), tool_name.clone(), input.clone()));
            }
            self.persist_tool_records().await?;

            self.deps.bus.emit(Channel::Progress, Event::ToolStart { id: call_id.clone(), name: tool_name.clone() });
            TraceEvent::ToolDispatched { agent_id: agent_id.to_string(), call_id: call_id.clone(), tool_name: tool_name.clone() }.emit();

            self.set_breakpoint(Breakpoint::PreTool, "pre_tool");
            self.transition_tool_call(call_id, ToolCallState::Queued);

            self.set_breakpoint(Breakpoint::ToolExecuting, "tool_executing");
            self.transition_tool_call(call_id, ToolCallState::Executing);

            let req = ExecuteRequest {
                tool: tool_name.clone(),
                input: input.clone(),
                context: ToolContext { agent_id: agent_id.to_string(), tool_call_id: call_id.clone() },
                timeout: None,
                cancel: cancel.clone(),
            };
            let executor = self.deps.tool_executor.clone();
            let exec_result =
                self.deps.middleware.run_tool_call(req, move |req| Box::pin(async move { Ok(executor.execute(req).await) })).await;

            let (is_error, output) = match exec_result {
                Ok(result) if result.outcome.success => {
                    self.complete_tool_call(call_id, &result.outcome.output);
                    (false, result.outcome.output)
                }
                Ok(result) => {
                    let error = result.outcome.error.unwrap_or_else(|| "tool failed".into());
                    self.fail_tool_call(call_id, &error).await?;
                    (true, error)
                }
                Err(e) => {
                    let error = e.to_string();
                    self.fail_tool_call(call_id, &error).await?;
                    (true, error)
                }
            };
            self.persist_tool_records().await?;

            if is_error {
                self.deps.bus.emit(Channel::Progress, Event::ToolError { id: call_id.clone(), name: tool_name.clone(), error: output.clone() });
            }

            self.set_breakpoint(Breakpoint::PostTool, "post_tool");
            self.deps.bus.emit(Channel::Progress, Event::ToolEnd { id: call_id.clone(), name: tool_name.clone() });

            result_blocks.push(ContentBlock::ToolResult { tool_use_id: call_id.clone(), content: output, is_error });
        }

        Ok(result_blocks)
    }
}
