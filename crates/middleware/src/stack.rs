//! Ordered interceptor chain around the two extension points named in the
//! design: model call and tool call. For a stack `[m1, .., mN]` and
//! terminal handler `H`, execution is `m1(req, m2(req, .. mN(req, H)))` --
//! each middleware decides whether to call `next` at all, so it may
//! short-circuit, mutate the request before forwarding, or observe/mutate
//! the response on the way back out.

use agentrt_domain::{Message, Result};
use agentrt_tools::{ExecuteRequest, ExecuteResult, ToolHandle};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct ModelCallRequest {
    pub agent_id: String,
    pub messages: Vec<Message>,
    pub cancel: CancellationToken,
}

/// The next link in the chain: calling it runs every remaining middleware
/// and finally the terminal handler.
pub type ModelCallNext<'a> = Box<dyn FnOnce(ModelCallRequest) -> BoxFuture<'a, Result<Vec<Message>>> + Send + 'a>;
pub type ToolCallNext<'a> = Box<dyn FnOnce(ExecuteRequest) -> BoxFuture<'a, Result<ExecuteResult>> + Send + 'a>;

#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Stable sort key; lower runs first (outermost in the chain).
    fn priority(&self) -> i32 {
        0
    }

    /// Default is a pass-through: middleware that doesn't care about model
    /// calls never has to override this.
    async fn handle_model_call<'a>(&'a self, req: ModelCallRequest, next: ModelCallNext<'a>) -> Result<Vec<Message>> {
        next(req).await
    }

    async fn handle_tool_call<'a>(&'a self, req: ExecuteRequest, next: ToolCallNext<'a>) -> Result<ExecuteResult> {
        next(req).await
    }

    /// Invoked once at agent creation. A failure here aborts agent
    /// initialization entirely.
    async fn on_agent_start(&self, _agent_id: &str) -> Result<()> {
        Ok(())
    }

    /// Invoked once at agent close. Never fails the close.
    async fn on_agent_stop(&self, _agent_id: &str) {}

    /// Tools this middleware contributes to the agent's tool map at
    /// startup. Name collisions favor the middleware's tool.
    fn contributed_tools(&self) -> Vec<ToolHandle> {
        Vec::new()
    }
}

pub struct MiddlewareStack {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new(mut middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        middlewares.sort_by_key(|m| m.priority());
        Self { middlewares }
    }

    pub fn contributed_tools(&self) -> Vec<ToolHandle> {
        self.middlewares.iter().flat_map(|m| m.contributed_tools()).collect()
    }

    pub async fn on_agent_start(&self, agent_id: &str) -> Result<()> {
        for mw in &self.middlewares {
            mw.on_agent_start(agent_id).await?;
        }
        Ok(())
    }

    pub async fn on_agent_stop(&self, agent_id: &str) {
        for mw in &self.middlewares {
            mw.on_agent_stop(agent_id).await;
        }
    }

    pub async fn run_model_call<'a, F>(&'a self, req: ModelCallRequest, terminal: F) -> Result<Vec<Message>>
    where
        F: FnOnce(ModelCallRequest) -> BoxFuture<'a, Result<Vec<Message>>> + Send + 'a,
    {
        self.run_model_call_at(0, req, Box::new(terminal)).await
    }

    fn run_model_call_at<'a>(
        &'a self,
        idx: usize,
        req: ModelCallRequest,
        terminal: ModelCallNext<'a>,
    ) -> BoxFuture<'a, Result<Vec<Message>>> {
        Box::pin(async move {
            match self.middlewares.get(idx) {
                None => terminal(req).await,
                Some(mw) => {
                    let next: ModelCallNext<'a> =
                        Box::new(move |req| self.run_model_call_at(idx + 1, req, terminal));
                    mw.handle_model_call(req, next).await
                }
            }
        })
    }

    pub async fn run_tool_call<'a, F>(&'a self, req: ExecuteRequest, terminal: F) -> Result<ExecuteResult>
    where
        F: FnOnce(ExecuteRequest) -> BoxFuture<'a, Result<ExecuteResult>> + Send + 'a,
    {
        self.run_tool_call_at(0, req, Box::new(terminal)).await
    }

    fn run_tool_call_at<'a>(
        &'a self,
        idx: usize,
        req: ExecuteRequest,
        terminal: ToolCallNext<'a>,
    ) -> BoxFuture<'a, Result<ExecuteResult>> {
        Box::pin(async move {
            match self.middlewares.get(idx) {
                None => terminal(req).await,
                Some(mw) => {
                    let next: ToolCallNext<'a> = Box::new(move |req| self.run_tool_call_at(idx + 1, req, terminal));
                    mw.handle_tool_call(req, next).await
                }
            }
        })
    }
}
