//! Tool-call bookkeeping: one record per `ToolUse` block, tracking its
//! progress from the moment the model emits it to its terminal result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered lifecycle of a tool call. Transitions are monotonic over this
/// order — a record may skip ahead to `Failed` from any state, but never
/// move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallState {
    Pending,
    Queued,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub state: ToolCallState,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub audit_trail: Vec<(ToolCallState, DateTime<Utc>)>,
}

impl ToolCallRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            input,
            state: ToolCallState::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            audit_trail: vec![(ToolCallState::Pending, now)],
        }
    }

    /// Moves the record forward. Panics on a backward transition other than
    /// into `Failed` — callers own the state machine and a violation here is
    /// a programming error, not recoverable input.
    pub fn transition(&mut self, next: ToolCallState) {
        assert!(
            next == ToolCallState::Failed || next >= self.state,
            "illegal tool call transition {:?} -> {:?}",
            self.state,
            next
        );
        let now = Utc::now();
        if next == ToolCallState::Executing && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if matches!(next, ToolCallState::Completed | ToolCallState::Failed) {
            self.completed_at = Some(now);
            if let Some(started) = self.started_at {
                self.duration_ms = Some((now - started).num_milliseconds());
            }
        }
        self.state = next;
        self.audit_trail.push((next, now));
    }

    pub fn complete(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.transition(ToolCallState::Completed);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.transition(ToolCallState::Failed);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ToolCallState::Completed | ToolCallState::Failed)
    }

    /// `true` for states observed mid-flight after a restart: these have no
    /// terminal result yet and must be handed to the resume strategy.
    pub fn is_pending_after_restart(&self) -> bool {
        matches!(self.state, ToolCallState::Queued | ToolCallState::Executing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_pending_with_one_audit_entry() {
        let r = ToolCallRecord::new("t1", "exec", serde_json::json!({}));
        assert_eq!(r.state, ToolCallState::Pending);
        assert_eq!(r.audit_trail.len(), 1);
    }

    #[test]
    fn complete_sets_duration_and_result() {
        let mut r = ToolCallRecord::new("t1", "exec", serde_json::json!({}));
        r.transition(ToolCallState::Queued);
        r.transition(ToolCallState::Executing);
        r.complete("ok");
        assert_eq!(r.state, ToolCallState::Completed);
        assert_eq!(r.result.as_deref(), Some("ok"));
        assert!(r.duration_ms.is_some());
        assert_eq!(r.audit_trail.len(), 4);
    }

    #[test]
    fn fail_is_reachable_from_any_state() {
        let mut r = ToolCallRecord::new("t1", "exec", serde_json::json!({}));
        r.fail("boom");
        assert_eq!(r.state, ToolCallState::Failed);
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    #[should_panic(expected = "illegal tool call transition")]
    fn backward_transition_panics() {
        let mut r = ToolCallRecord::new("t1", "exec", serde_json::json!({}));
        r.transition(ToolCallState::Executing);
        r.transition(ToolCallState::Queued);
    }

    #[test]
    fn pending_after_restart_flags_only_mid_flight_states() {
        let mut r = ToolCallRecord::new("t1", "exec", serde_json::json!({}));
        assert!(!r.is_pending_after_restart());
        r.transition(ToolCallState::Queued);
        assert!(r.is_pending_after_restart());
        r.transition(ToolCallState::Executing);
        assert!(r.is_pending_after_restart());
        r.complete("ok");
        assert!(!r.is_pending_after_restart());
    }
}
