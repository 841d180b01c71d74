//! Read-mostly map of every skill known to the runtime. Registration
//! happens at startup; injection reads happen on every user message from
//! many agents concurrently.

use agentrt_domain::SkillDefinition;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct SkillRegistry {
    skills: RwLock<HashMap<String, SkillDefinition>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self { skills: RwLock::new(HashMap::new()) }
    }

    /// Validates before inserting; callers surface the error at startup
    /// rather than silently dropping a malformed skill.
    pub fn register(&self, skill: SkillDefinition) -> agentrt_domain::Result<()> {
        skill.validate()?;
        self.skills.write().insert(skill.name.clone(), skill);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SkillDefinition> {
        self.skills.read().get(name).cloned()
    }

    pub fn list(&self) -> Vec<SkillDefinition> {
        self.skills.read().values().cloned().collect()
    }
}
