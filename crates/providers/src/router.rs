//! Capability-free routing: maps a [`RouterIntent`] to a concrete
//! [`ModelConfig`] via a static lookup table with fall-through. No network
//! calls, no provider instances -- the engine calls a provider only after
//! the model config is resolved.

use agentrt_domain::{Error, ModelConfig, Result, RouterIntent};

#[derive(Debug, Clone)]
struct Rule {
    task: String,
    priority: String,
    config: ModelConfig,
}

/// A static lookup from routing intent to model config. Optional in the
/// engine: an agent configured with a fixed `ModelConfig` never consults
/// one.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: Vec<Rule>,
    default: Option<ModelConfig>,
}

impl Router {
    pub fn new() -> Self {
        Self { rules: Vec::new(), default: None }
    }

    /// Register a rule matching an exact `(task, priority)` pair. Pass an
    /// empty string for `priority` to register rule (2) below.
    pub fn with_rule(mut self, task: impl Into<String>, priority: impl Into<String>, config: ModelConfig) -> Self {
        self.rules.push(Rule { task: task.into(), priority: priority.into(), config });
        self
    }

    pub fn with_default(mut self, config: ModelConfig) -> Self {
        self.default = Some(config);
        self
    }

    /// Matching rules, in order: (1) exact task and priority, (2) exact
    /// task with empty priority, (3) the configured default. Failure is
    /// fatal only when no default is configured.
    pub fn select_model(&self, intent: &RouterIntent) -> Result<ModelConfig> {
        let priority = intent.priority.as_deref().unwrap_or("");

        if let Some(rule) = self.rules.iter().find(|r| r.task == intent.task && r.priority == priority) {
            return Ok(rule.config.clone());
        }

        if let Some(rule) = self.rules.iter().find(|r| r.task == intent.task && r.priority.is_empty()) {
            return Ok(rule.config.clone());
        }

        self.default
            .clone()
            .ok_or_else(|| Error::Config(format!("no route for task '{}' and no default configured", intent.task)))
    }
}
