//! The `Sandbox` contract: command execution and filesystem access for one
//! agent. An interface only -- no concrete sandbox lives in this crate.
//! Every agent owns its sandbox exclusively; disposal on close is
//! guaranteed on every exit path.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ExecOpts {
    pub timeout: Option<Duration>,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default)]
pub struct GlobOpts {
    pub cwd: Option<String>,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn exec(&self, cmd: &str, opts: ExecOpts) -> Result<ExecOutput>;
    async fn read(&self, path: &str) -> Result<String>;
    async fn write(&self, path: &str, content: &str) -> Result<()>;
    async fn glob(&self, pattern: &str, opts: GlobOpts) -> Result<Vec<String>>;
    fn work_dir(&self) -> &str;
    async fn dispose(&self);
}
