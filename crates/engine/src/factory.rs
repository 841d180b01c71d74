//! Factory contracts for the two per-agent resources that can't be shared:
//! a live provider handle and an exclusive sandbox. Both factories
//! themselves are read-mostly and shared across agents (see concurrency
//! model); what they produce is not.

use agentrt_domain::{AgentId, ModelConfig, Result, Sandbox};
use agentrt_providers::LlmProvider;
use std::sync::Arc;

pub trait ProviderFactory: Send + Sync {
    fn create(&self, model: &ModelConfig) -> Result<Arc<dyn LlmProvider>>;
}

pub trait SandboxFactory: Send + Sync {
    fn create(&self, agent_id: &AgentId) -> Result<Arc<dyn Sandbox>>;
}
