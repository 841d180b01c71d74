//! Progressive-disclosure skill injection: the system prompt gets an
//! overview line per enabled skill -- name, one-line description, on-disk
//! path -- never the body of SKILL.md. The model opens the file itself via
//! filesystem tools when it decides the skill is relevant.

use crate::registry::SkillRegistry;
use agentrt_domain::SkillDefinition;

const HEADING: &str = "## Available Skills";

pub struct SkillInjector<'a> {
    registry: &'a SkillRegistry,
}

impl<'a> SkillInjector<'a> {
    pub fn new(registry: &'a SkillRegistry) -> Self {
        Self { registry }
    }

    /// Render the overview block for every registered skill. Empty when no
    /// skills are registered, so callers can skip appending it entirely.
    pub fn render_overview_block(&self) -> String {
        render_overview(&self.registry.list())
    }

    /// Same rendering restricted to an explicit subset, for templates that
    /// enable only a named list of skills.
    pub fn render_overview_for(&self, names: &[String]) -> String {
        let skills: Vec<SkillDefinition> = names
            .iter()
            .filter_map(|n| self.registry.get(n))
            .collect();
        render_overview(&skills)
    }
}

fn render_overview(skills: &[SkillDefinition]) -> String {
    if skills.is_empty() {
        return String::new();
    }
    let mut lines = vec![HEADING.to_string()];
    for skill in skills {
        lines.push(format!("- {}: {} (path: {})", skill.name, skill.description, skill.path));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_domain::SkillKind;

    fn skill(name: &str) -> SkillDefinition {
        SkillDefinition {
            name: name.into(),
            description: "extracts text from PDFs".into(),
            kind: SkillKind::Knowledge,
            triggers: vec![],
            executable: None,
            path: format!("/skills/{name}/SKILL.md"),
        }
    }

    #[test]
    fn empty_registry_renders_empty_block() {
        let registry = SkillRegistry::new();
        let injector = SkillInjector::new(&registry);
        assert!(injector.render_overview_block().is_empty());
    }

    #[test]
    fn block_lists_name_description_and_path_never_body() {
        let registry = SkillRegistry::new();
        registry.register(skill("pdf-extract")).unwrap();
        let injector = SkillInjector::new(&registry);
        let block = injector.render_overview_block();
        assert!(block.contains("pdf-extract"));
        assert!(block.contains("extracts text from PDFs"));
        assert!(block.contains("/skills/pdf-extract/SKILL.md"));
    }

    #[test]
    fn render_overview_for_filters_to_named_subset() {
        let registry = SkillRegistry::new();
        registry.register(skill("pdf-extract")).unwrap();
        registry.register(skill("csv-parse")).unwrap();
        let injector = SkillInjector::new(&registry);
        let block = injector.render_overview_for(&["csv-parse".to_string()]);
        assert!(block.contains("csv-parse"));
        assert!(!block.contains("pdf-extract"));
    }
}
