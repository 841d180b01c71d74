//! Runs a named tool under a global per-agent concurrency cap and a
//! per-call deadline.

use crate::registry::ToolRegistry;
use crate::traits::{ToolContext, ToolOutcome};
use agentrt_domain::TraceEvent;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONCURRENCY: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    semaphore: Arc<Semaphore>,
    default_timeout: Duration,
}

pub struct ExecuteRequest {
    pub tool: String,
    pub input: Value,
    pub context: ToolContext,
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

pub struct ExecuteResult {
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(permits));
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run one tool call. Always returns `Ok` -- a missing tool, a timeout,
    /// or a tool-internal failure all surface as `success = false` in the
    /// outcome rather than as an `Err`, since the model reads the result
    /// back as a normal tool response either way.
    pub async fn execute(&self, req: ExecuteRequest) -> ExecuteResult {
        let start = Instant::now();

        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");

        let tool = match self.registry.get(&req.tool) {
            Some(t) => t,
            None => {
                return ExecuteResult {
                    outcome: ToolOutcome::failed(format!("unknown tool '{}'", req.tool)),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let timeout = req.timeout.unwrap_or(self.default_timeout);
        let call = tool.call(req.input, &req.context);

        let outcome = tokio::select! {
            biased;
            _ = req.cancel.cancelled() => {
                tracing::warn!(tool = %req.tool, "tool call cancelled");
                ToolOutcome::cancelled()
            }
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => ToolOutcome::failed(e.to_string()),
                Err(_) => {
                    tracing::warn!(tool = %req.tool, timeout_ms = %timeout.as_millis(), "tool call timed out");
                    ToolOutcome::timeout()
                }
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        TraceEvent::ToolCompleted {
            agent_id: req.context.agent_id.clone(),
            call_id: req.context.tool_call_id.clone(),
            tool_name: req.tool.clone(),
            duration_ms,
            failed: !outcome.success,
        }
        .emit();

        ExecuteResult { outcome, duration_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Tool;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn input_schema(&self) -> &Value {
            static SCHEMA: Value = Value::Null;
            &SCHEMA
        }
        async fn call(&self, input: Value, _ctx: &ToolContext) -> agentrt_domain::Result<ToolOutcome> {
            Ok(ToolOutcome::ok(input.to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never finishes in time"
        }
        fn input_schema(&self) -> &Value {
            static SCHEMA: Value = Value::Null;
            &SCHEMA
        }
        async fn call(&self, _input: Value, _ctx: &ToolContext) -> agentrt_domain::Result<ToolOutcome> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ToolOutcome::ok("too late"))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext { agent_id: "a1".into(), tool_call_id: "t1".into() }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_outcome_not_an_error() {
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(registry);
        let result = executor
            .execute(ExecuteRequest { tool: "missing".into(), input: Value::Null, context: ctx(), timeout: None, cancel: CancellationToken::new() })
            .await;
        assert!(!result.outcome.success);
    }

    #[tokio::test]
    async fn successful_call_returns_output() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Echo));
        let executor = ToolExecutor::new(registry);
        let result = executor
            .execute(ExecuteRequest {
                tool: "echo".into(),
                input: serde_json::json!({"x": 1}),
                context: ctx(),
                timeout: None,
                cancel: CancellationToken::new(),
            })
            .await;
        assert!(result.outcome.success);
        assert_eq!(result.outcome.output, "{\"x\":1}");
    }

    #[tokio::test]
    async fn exceeded_deadline_yields_timeout_outcome() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Slow));
        let executor = ToolExecutor::new(registry).with_default_timeout(Duration::from_millis(20));
        let result = executor
            .execute(ExecuteRequest { tool: "slow".into(), input: Value::Null, context: ctx(), timeout: None, cancel: CancellationToken::new() })
            .await;
        assert!(!result.outcome.success);
        assert_eq!(result.outcome.error.as_deref(), Some("TIMEOUT"));
    }

    #[tokio::test]
    async fn cancellation_while_the_tool_is_running_yields_cancelled_outcome() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Slow));
        let executor = ToolExecutor::new(registry);
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();
        let handle = tokio::spawn(async move {
            executor
                .execute(ExecuteRequest {
                    tool: "slow".into(),
                    input: Value::Null,
                    context: ctx(),
                    timeout: None,
                    cancel: cancel_for_task,
                })
                .await
        });
        tokio::task::yield_now().await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(!result.outcome.success);
        assert_eq!(result.outcome.error.as_deref(), Some("CANCELLED"));
    }
}
