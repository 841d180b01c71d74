//! Contributes file-scoped tools (`read_file`, `write_file`) bounded by a
//! shared per-agent token budget, so an agent cannot read its way through
//! an unbounded amount of context in one turn.

use crate::stack::Middleware;
use agentrt_domain::{Error, Result, Sandbox};
use agentrt_tools::{Tool, ToolContext, ToolHandle, ToolOutcome};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Rough chars-per-token estimate used to charge the shared budget.
/// Deliberately conservative: it's cheaper to under-read than to blow a
/// real provider's context window.
const CHARS_PER_TOKEN: usize = 4;

struct Budget {
    remaining_tokens: AtomicUsize,
}

impl Budget {
    fn charge(&self, chars: usize) -> Result<()> {
        let tokens = chars.div_ceil(CHARS_PER_TOKEN);
        let mut current = self.remaining_tokens.load(Ordering::Relaxed);
        loop {
            if tokens > current {
                return Err(Error::Tool(format!(
                    "file tool budget exhausted: needs {tokens} tokens, {current} remaining"
                )));
            }
            match self.remaining_tokens.compare_exchange_weak(
                current,
                current - tokens,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }
}

struct ReadFileTool {
    sandbox: Arc<dyn Sandbox>,
    budget: Arc<Budget>,
    schema: Value,
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a file's contents, charged against the agent's file-tool token budget."
    }
    fn input_schema(&self) -> &Value {
        &self.schema
    }
    async fn call(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("read_file requires a 'path' string".into()))?;
        let content = self.sandbox.read(path).await?;
        self.budget.charge(content.len())?;
        Ok(ToolOutcome::ok(content))
    }
}

struct WriteFileTool {
    sandbox: Arc<dyn Sandbox>,
    budget: Arc<Budget>,
    schema: Value,
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write a file's contents, charged against the agent's file-tool token budget."
    }
    fn input_schema(&self) -> &Value {
        &self.schema
    }
    async fn call(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("write_file requires a 'path' string".into()))?;
        let content = input
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("write_file requires a 'content' string".into()))?;
        self.budget.charge(content.len())?;
        self.sandbox.write(path, content).await?;
        Ok(ToolOutcome::ok(format!("wrote {} bytes to {path}", content.len())))
    }
}

pub struct FilesystemWrapper {
    sandbox: Arc<dyn Sandbox>,
    budget: Arc<Budget>,
}

impl FilesystemWrapper {
    pub fn new(sandbox: Arc<dyn Sandbox>, token_budget: usize) -> Self {
        Self { sandbox, budget: Arc::new(Budget { remaining_tokens: AtomicUsize::new(token_budget) }) }
    }
}

impl Middleware for FilesystemWrapper {
    fn name(&self) -> &str {
        "filesystem_wrapper"
    }

    fn contributed_tools(&self) -> Vec<ToolHandle> {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
            "required": ["path"],
        });
        vec![
            Arc::new(ReadFileTool { sandbox: self.sandbox.clone(), budget: self.budget.clone(), schema: schema.clone() }),
            Arc::new(WriteFileTool { sandbox: self.sandbox.clone(), budget: self.budget.clone(), schema }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_domain::{ExecOpts, ExecOutput, GlobOpts};

    struct FakeSandbox;

    #[async_trait::async_trait]
    impl Sandbox for FakeSandbox {
        async fn exec(&self, _cmd: &str, _opts: ExecOpts) -> Result<ExecOutput> {
            unimplemented!()
        }
        async fn read(&self, _path: &str) -> Result<String> {
            Ok("x".repeat(40))
        }
        async fn write(&self, _path: &str, _content: &str) -> Result<()> {
            Ok(())
        }
        async fn glob(&self, _pattern: &str, _opts: GlobOpts) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn work_dir(&self) -> &str {
            "/tmp"
        }
        async fn dispose(&self) {}
    }

    fn ctx() -> ToolContext {
        ToolContext { agent_id: "a1".into(), tool_call_id: "t1".into() }
    }

    #[tokio::test]
    async fn read_under_budget_succeeds() {
        let wrapper = FilesystemWrapper::new(Arc::new(FakeSandbox), 1000);
        let tools = wrapper.contributed_tools();
        let read = tools.iter().find(|t| t.name() == "read_file").unwrap();
        let result = read.call(serde_json::json!({"path": "a.txt"}), &ctx()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn read_exceeding_budget_errors() {
        let wrapper = FilesystemWrapper::new(Arc::new(FakeSandbox), 2);
        let tools = wrapper.contributed_tools();
        let read = tools.iter().find(|t| t.name() == "read_file").unwrap();
        assert!(read.call(serde_json::json!({"path": "a.txt"}), &ctx()).await.is_err());
    }

    #[tokio::test]
    async fn missing_path_is_a_tool_error() {
        let wrapper = FilesystemWrapper::new(Arc::new(FakeSandbox), 1000);
        let tools = wrapper.contributed_tools();
        let read = tools.iter().find(|t| t.name() == "read_file").unwrap();
        assert!(read.call(serde_json::json!({}), &ctx()).await.is_err());
    }
}
