//! Shared types for the agent runtime: messages, events, tool-call
//! bookkeeping, capabilities, and the error taxonomy. No crate in the
//! workspace depends on another's private modules — everything crosses
//! crate boundaries through these types.

pub mod capability;
pub mod error;
pub mod event;
pub mod ids;
pub mod message;
pub mod router;
pub mod sandbox;
pub mod skill;
pub mod status;
pub mod store;
pub mod stream;
pub mod template;
pub mod tool_call;
pub mod trace;

pub use capability::{LlmCapabilities, ToolCallingFormat};
pub use error::{Error, Result};
pub use event::{Bookmark, Channel, Event, EventEnvelope};
pub use ids::AgentId;
pub use message::{ContentBlock, Message, Role};
pub use router::RouterIntent;
pub use sandbox::{ExecOpts, ExecOutput, GlobOpts, Sandbox};
pub use skill::{validate_skill_name, ExecutableSpec, SkillDefinition, SkillKind};
pub use status::{AgentState, AgentStatus, Breakpoint};
pub use store::Store;
pub use stream::{BlockDelta, BlockKind, BoxStream, NormalizedChunk, Usage};
pub use template::{ModelConfig, TemplateDefinition};
pub use tool_call::{ToolCallRecord, ToolCallState};
pub use trace::TraceEvent;
