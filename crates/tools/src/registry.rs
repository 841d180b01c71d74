//! Read-mostly map of every tool known to the runtime. Registration happens
//! at startup; lookups happen on every turn from many agents concurrently.

use crate::traits::ToolHandle;
use agentrt_domain::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolHandle>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: RwLock::new(HashMap::new()) }
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one -- this is how middleware-contributed tools win
    /// name collisions against built-ins (callers log the overwrite).
    pub fn register(&self, tool: ToolHandle) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        self.tools.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Every registered tool, for building the "Tools Manual" system-prompt
    /// section and the per-request tool-schema list sent to the provider.
    pub fn all(&self) -> Vec<ToolHandle> {
        self.tools.read().values().cloned().collect()
    }

    /// Subset restricted to an agent template's `tool_names`. Unknown names
    /// are a config error caught at agent-create time, not at call time.
    pub fn subset(&self, names: &[String]) -> Result<Vec<ToolHandle>> {
        names
            .iter()
            .map(|n| self.get(n).ok_or_else(|| Error::Config(format!("unknown tool '{n}'"))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Tool, ToolContext, ToolOutcome};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct Stub {
        name: &'static str,
        schema: Value,
    }

    impl Stub {
        fn new(name: &'static str) -> Self {
            Self { name, schema: serde_json::json!({}) }
        }
    }

    #[async_trait]
    impl Tool for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> &Value {
            &self.schema
        }
        async fn call(&self, _input: Value, _ctx: &ToolContext) -> agentrt_domain::Result<ToolOutcome> {
            Ok(ToolOutcome::ok("done"))
        }
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Stub::new("search")));
        assert_eq!(registry.get("search").unwrap().description(), "stub");
        registry.register(Arc::new(Stub::new("search")));
        assert!(registry.contains("search"));
    }

    #[test]
    fn subset_errors_on_unknown_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Stub::new("search")));
        assert!(registry.subset(&["search".into()]).is_ok());
        assert!(registry.subset(&["missing".into()]).is_err());
    }
}
