//! Routing intent: the lookup key a Router resolves to a `ModelConfig`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterIntent {
    pub task: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl RouterIntent {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            priority: None,
            template_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}
