//! Skill metadata and the naming/validation rules enforced on it.
//!
//! Loading SKILL.md files (YAML frontmatter + Markdown body) is out of
//! scope here; this module owns only the parsed shape and its invariants.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9-]{1,64}$").unwrap())
}

const MAX_DESCRIPTION_LEN: usize = 1024;

const RESERVED_NAMES: &[&str] = &["system", "help", "default", "none"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Knowledge,
    Executable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutableSpec {
    pub runtime: String,
    pub entry: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    pub kind: SkillKind,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub executable: Option<ExecutableSpec>,
    /// On-disk path of the SKILL.md this was parsed from; injected into the
    /// overview block but never dereferenced by this crate.
    pub path: String,
}

impl SkillDefinition {
    pub fn validate(&self) -> Result<()> {
        validate_skill_name(&self.name)?;
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(Error::Config(format!(
                "skill '{}': description exceeds {} characters",
                self.name, MAX_DESCRIPTION_LEN
            )));
        }
        if self.kind == SkillKind::Executable && self.executable.is_none() {
            return Err(Error::Config(format!(
                "skill '{}': kind executable requires an executable spec",
                self.name
            )));
        }
        Ok(())
    }
}

/// Enforces the name grammar and the reserved/forbidden-term rules. Applied
/// both at load time and whenever a skill is registered programmatically.
pub fn validate_skill_name(name: &str) -> Result<()> {
    if !name_pattern().is_match(name) {
        return Err(Error::Config(format!(
            "skill name '{name}' must match [a-z0-9-]{{1,64}}"
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(Error::Config(format!("skill name '{name}' is reserved")));
    }
    let lower = name.to_ascii_lowercase();
    if lower.contains("anthropic") || lower.contains("claude") {
        return Err(Error::Config(format!(
            "skill name '{name}' may not reference anthropic or claude"
        )));
    }
    if name.contains(['<', '>', '&', '"', '\'']) {
        return Err(Error::Config(format!(
            "skill name '{name}' contains forbidden XML meta characters"
        )));
    }
    Ok(())
}
