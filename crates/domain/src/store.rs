//! The `Store` contract: per-agent persistence. Last-writer-wins per key;
//! atomicity within a single key write is required. An interface only --
//! no concrete backend lives in this crate.

use crate::{Message, Result, ToolCallRecord};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_messages(&self, agent_id: &str, messages: &[Message]) -> Result<()>;
    async fn load_messages(&self, agent_id: &str) -> Result<Vec<Message>>;
    async fn save_tool_call_records(&self, agent_id: &str, records: &[ToolCallRecord]) -> Result<()>;
    async fn load_tool_call_records(&self, agent_id: &str) -> Result<Vec<ToolCallRecord>>;
    async fn save_info(&self, agent_id: &str, info: &Value) -> Result<()>;
}
