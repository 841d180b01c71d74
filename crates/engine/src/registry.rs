//! Read-mostly map of every agent template known to the runtime.
//! Registration happens at startup; lookups happen once per `create` call.

use agentrt_domain::{Error, Result, TemplateDefinition};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, TemplateDefinition>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, template: TemplateDefinition) {
        self.templates.write().insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Result<TemplateDefinition> {
        self.templates
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown template '{id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_domain::ModelConfig;

    fn template(id: &str) -> TemplateDefinition {
        TemplateDefinition {
            id: id.into(),
            system_prompt: "you are helpful".into(),
            model: ModelConfig { provider: "anthropic".into(), model: "sonnet".into(), temperature: None, max_tokens: None },
            tool_names: vec![],
            runtime_hints: serde_json::Value::Null,
        }
    }

    #[test]
    fn unknown_template_is_a_config_error() {
        let registry = TemplateRegistry::new();
        assert!(registry.get("missing").is_err());
    }

    #[test]
    fn registered_template_is_found_by_id() {
        let registry = TemplateRegistry::new();
        registry.register(template("default"));
        assert_eq!(registry.get("default").unwrap().system_prompt, "you are helpful");
    }
}
