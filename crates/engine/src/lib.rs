//! The agent runtime engine: the `Agent` turn state machine, its public
//! API, the streaming chunk assembler, and the process-wide registries and
//! factories it's built from.

mod agent;
mod assembler;
mod config;
mod factory;
mod registry;
mod tools_manual;
mod turn;

pub use agent::{Agent, ChatResult, ResumeStrategy, RuntimeDeps};
pub use config::RuntimeConfig;
pub use factory::{ProviderFactory, SandboxFactory};
pub use registry::TemplateRegistry;
