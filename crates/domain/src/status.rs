//! Agent run state and the breakpoint sequence a turn walks through.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Ready,
    Working,
}

/// Fine-grained position within a step, in walk order. `Ready` is the
/// resting value outside any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breakpoint {
    Ready,
    PreModel,
    StreamingModel,
    ToolPending,
    PreTool,
    ToolExecuting,
    PostTool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub breakpoint: Breakpoint,
    pub step_count: u64,
    pub cursor: i64,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            state: AgentState::Ready,
            breakpoint: Breakpoint::Ready,
            step_count: 0,
            cursor: 0,
        }
    }
}

impl AgentStatus {
    pub fn is_working(&self) -> bool {
        self.state == AgentState::Working
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_ready() {
        let s = AgentStatus::default();
        assert_eq!(s.state, AgentState::Ready);
        assert_eq!(s.breakpoint, Breakpoint::Ready);
        assert!(!s.is_working());
    }
}
