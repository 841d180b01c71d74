//! Allow/deny/ask gate in front of tool dispatch. `ask` routes through the
//! same [`ApprovalStore`] channel the HITL middleware uses, so a host only
//! needs one decision-submission path regardless of which middleware is
//! waiting.

use crate::approval::{ApprovalStore, Decision};
use crate::stack::{Middleware, ToolCallNext};
use agentrt_domain::{Channel, Event, Result};
use agentrt_eventbus::EventBus;
use agentrt_tools::{ExecuteRequest, ExecuteResult, ToolOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Allow,
    Deny,
    Ask,
}

pub struct PermissionGate {
    rules: RwLock<HashMap<String, Permission>>,
    default: Permission,
    store: Arc<ApprovalStore>,
    bus: Arc<EventBus>,
    timeout: Duration,
}

impl PermissionGate {
    pub fn new(default: Permission, store: Arc<ApprovalStore>, bus: Arc<EventBus>) -> Self {
        Self { rules: RwLock::new(HashMap::new()), default, store, bus, timeout: Duration::from_secs(300) }
    }

    pub fn set_rule(&self, tool: impl Into<String>, permission: Permission) {
        self.rules.write().insert(tool.into(), permission);
    }

    fn permission_for(&self, tool: &str) -> Permission {
        self.rules.read().get(tool).copied().unwrap_or(self.default)
    }
}

#[async_trait::async_trait]
impl Middleware for PermissionGate {
    fn name(&self) -> &str {
        "permission_gate"
    }

    fn priority(&self) -> i32 {
        -90
    }

    async fn handle_tool_call<'a>(&'a self, req: ExecuteRequest, next: ToolCallNext<'a>) -> Result<ExecuteResult> {
        match self.permission_for(&req.tool) {
            Permission::Allow => next(req).await,
            Permission::Deny => {
                Ok(ExecuteResult { outcome: ToolOutcome::failed(format!("'{}' is denied by policy", req.tool)), duration_ms: 0 })
            }
            Permission::Ask => {
                let cancel = req.cancel.clone();
                let (request_id, rx) = self.store.register();
                self.bus.emit(
                    Channel::Control,
                    Event::PermissionDecision {
                        request_id: request_id.clone(),
                        decision: serde_json::json!({"status": "pending", "tool": req.tool, "input": req.input}),
                    },
                );

                let decision = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        self.store.forget(&request_id);
                        return Ok(ExecuteResult { outcome: ToolOutcome::cancelled(), duration_ms: 0 });
                    }
                    result = tokio::time::timeout(self.timeout, rx) => match result {
                        Ok(Ok(d)) => d,
                        _ => {
                            return Ok(ExecuteResult {
                                outcome: ToolOutcome::failed("permission request timed out"),
                                duration_ms: 0,
                            })
                        }
                    },
                };

                match decision {
                    Decision::Approve => next(req).await,
                    Decision::Edit { new_input } => {
                        let mut req = req;
                        req.input = new_input;
                        next(req).await
                    }
                    Decision::Reject { reason } => Ok(ExecuteResult {
                        outcome: ToolOutcome::failed(reason.unwrap_or_else(|| "denied by reviewer".into())),
                        duration_ms: 0,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::MiddlewareStack;
    use agentrt_tools::ToolContext;
    use std::sync::Arc;

    fn ctx() -> ToolContext {
        ToolContext { agent_id: "a1".into(), tool_call_id: "t1".into() }
    }

    #[tokio::test]
    async fn denied_tool_never_reaches_terminal() {
        let store = Arc::new(ApprovalStore::new());
        let bus = Arc::new(EventBus::new());
        let gate = PermissionGate::new(Permission::Allow, store, bus);
        gate.set_rule("rm", Permission::Deny);
        let stack = MiddlewareStack::new(vec![Arc::new(gate)]);

        let req = ExecuteRequest {
            tool: "rm".into(),
            input: serde_json::Value::Null,
            context: ctx(),
            timeout: None,
            cancel: CancellationToken::new(),
        };
        let result = stack.run_tool_call(req, |_| Box::pin(async move { panic!("must not run") })).await.unwrap();
        assert!(!result.outcome.success);
    }

    #[tokio::test]
    async fn default_allow_passes_through() {
        let store = Arc::new(ApprovalStore::new());
        let bus = Arc::new(EventBus::new());
        let gate = PermissionGate::new(Permission::Allow, store, bus);
        let stack = MiddlewareStack::new(vec![Arc::new(gate)]);

        let req = ExecuteRequest {
            tool: "read_file".into(),
            input: serde_json::Value::Null,
            context: ctx(),
            timeout: None,
            cancel: CancellationToken::new(),
        };
        let result = stack
            .run_tool_call(req, |r| Box::pin(async move { Ok(ExecuteResult { outcome: ToolOutcome::ok(r.tool), duration_ms: 1 }) }))
            .await
            .unwrap();
        assert!(result.outcome.success);
    }

    #[tokio::test]
    async fn cancellation_unblocks_an_ask_wait() {
        let store = Arc::new(ApprovalStore::new());
        let bus = Arc::new(EventBus::new());
        let gate = PermissionGate::new(Permission::Allow, store, bus);
        gate.set_rule("rm", Permission::Ask);
        let stack = Arc::new(MiddlewareStack::new(vec![Arc::new(gate)]));
        let stack2 = stack.clone();
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();

        let handle = tokio::spawn(async move {
            let req = ExecuteRequest {
                tool: "rm".into(),
                input: serde_json::Value::Null,
                context: ctx(),
                timeout: None,
                cancel: cancel_for_task,
            };
            stack2.run_tool_call(req, |_| Box::pin(async move { panic!("must not run") })).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = handle.await.unwrap().unwrap();
        assert!(!result.outcome.success);
        assert_eq!(result.outcome.error.as_deref(), Some("CANCELLED"));
    }
}
