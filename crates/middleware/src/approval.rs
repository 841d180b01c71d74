//! Human-in-the-loop approval: a tool call whose name is in `interrupt_on`
//! is suspended, a control event carrying the proposed action is emitted,
//! and the call blocks until a [`Decision`] is submitted out-of-band (via
//! whatever channel the host exposes `ApprovalStore::resolve` through).

use crate::stack::{Middleware, ToolCallNext};
use agentrt_domain::{Channel, Error, Event, Result};
use agentrt_eventbus::EventBus;
use agentrt_tools::ExecuteRequest;
use agentrt_tools::{ExecuteResult, ToolOutcome};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Decision {
    Approve,
    Reject { reason: Option<String> },
    Edit { new_input: serde_json::Value },
}

struct Pending {
    respond: oneshot::Sender<Decision>,
}

/// Tracks calls suspended awaiting a human decision. Entries are removed
/// the moment they resolve, whether by decision or by timeout.
#[derive(Default)]
pub struct ApprovalStore {
    pending: RwLock<HashMap<String, Pending>>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self) -> (String, oneshot::Receiver<Decision>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.write().insert(id.clone(), Pending { respond: tx });
        (id, rx)
    }

    /// Resolve a pending approval. Returns `false` if the id is unknown
    /// (already resolved, timed out, or never existed).
    pub fn resolve(&self, request_id: &str, decision: Decision) -> bool {
        if let Some(pending) = self.pending.write().remove(request_id) {
            let _ = pending.respond.send(decision);
            true
        } else {
            false
        }
    }

    pub(crate) fn forget(&self, request_id: &str) {
        self.pending.write().remove(request_id);
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.read().keys().cloned().collect()
    }
}

pub struct HitlMiddleware {
    interrupt_on: HashSet<String>,
    store: Arc<ApprovalStore>,
    bus: Arc<EventBus>,
    timeout: Duration,
}

impl HitlMiddleware {
    pub fn new(interrupt_on: impl IntoIterator<Item = String>, store: Arc<ApprovalStore>, bus: Arc<EventBus>) -> Self {
        Self { interrupt_on: interrupt_on.into_iter().collect(), store, bus, timeout: Duration::from_secs(300) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Middleware for HitlMiddleware {
    fn name(&self) -> &str {
        "hitl"
    }

    fn priority(&self) -> i32 {
        -100
    }

    async fn handle_tool_call<'a>(&'a self, mut req: ExecuteRequest, next: ToolCallNext<'a>) -> Result<ExecuteResult> {
        if !self.interrupt_on.contains(&req.tool) {
            return next(req).await;
        }

        let cancel = req.cancel.clone();
        let (request_id, rx) = self.store.register();

        self.bus.emit(
            Channel::Control,
            Event::PermissionDecision {
                request_id: request_id.clone(),
                decision: serde_json::json!({
                    "status": "pending",
                    "tool": req.tool,
                    "input": req.input,
                }),
            },
        );

        let decision = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.store.forget(&request_id);
                return Ok(ExecuteResult { outcome: ToolOutcome::cancelled(), duration_ms: 0 });
            }
            result = tokio::time::timeout(self.timeout, rx) => match result {
                Ok(Ok(decision)) => decision,
                Ok(Err(_)) | Err(_) => {
                    self.store.forget(&request_id);
                    return Ok(ExecuteResult { outcome: ToolOutcome::failed("approval timed out"), duration_ms: 0 });
                }
            },
        };

        match decision {
            Decision::Approve => next(req).await,
            Decision::Edit { new_input } => {
                req.input = new_input;
                next(req).await
            }
            Decision::Reject { reason } => Ok(ExecuteResult {
                outcome: ToolOutcome::failed(reason.unwrap_or_else(|| "rejected by reviewer".into())),
                duration_ms: 0,
            }),
        }
    }
}
