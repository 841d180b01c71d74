//! Renders the "Tools Manual" system-prompt section: one entry per
//! available tool, in deterministic (name-sorted) order, carrying the
//! tool's structured schema name and its free-form prompt. Rebuilt fresh
//! on every model call rather than mutated in place, so there is never a
//! stale or duplicated section to strip.

use agentrt_tools::ToolHandle;

const HEADING: &str = "## Tools Manual";

pub fn render_tools_manual(tools: &[ToolHandle]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&ToolHandle> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name().cmp(b.name()));

    let mut sections = vec![HEADING.to_string()];
    for tool in sorted {
        sections.push(format!("### {}\n{}", tool.name(), tool.prompt()));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_tools::{Tool, ToolContext, ToolOutcome};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct Stub {
        name: &'static str,
        prompt: &'static str,
        schema: Value,
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
        fn prompt(&self) -> &str {
            self.prompt
        }
        async fn call(&self, _input: Value, _ctx: &ToolContext) -> agentrt_domain::Result<ToolOutcome> {
            Ok(ToolOutcome::ok(""))
        }
    }

    #[test]
    fn empty_tool_list_renders_empty_string() {
        assert_eq!(render_tools_manual(&[]), "");
    }

    #[test]
    fn tools_are_ordered_by_name_regardless_of_input_order() {
        let tools: Vec<ToolHandle> = vec![
            Arc::new(Stub { name: "write_file", prompt: "writes a file", schema: serde_json::json!({}) }),
            Arc::new(Stub { name: "read_file", prompt: "reads a file", schema: serde_json::json!({}) }),
        ];
        let manual = render_tools_manual(&tools);
        assert!(manual.find("read_file").unwrap() < manual.find("write_file").unwrap());
        assert!(manual.contains("reads a file"));
    }
}
