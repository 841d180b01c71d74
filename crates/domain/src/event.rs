//! The event taxonomy emitted on the bus: three channels, a closed set of
//! kinds per channel, and the envelope/bookmark wrapper used for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Progress,
    Control,
    Monitor,
}

/// A point a subscription can resume from. `cursor` is exclusive: replay
/// starts at the first envelope with a strictly greater cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub cursor: i64,
    pub ts: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(cursor: i64) -> Self {
        Self {
            cursor,
            ts: Utc::now(),
        }
    }
}

/// One event on a given channel. Variant tag matches the canonical kind
/// names used over the wire and in subscription filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    // Progress
    TextChunkStart { index: u32 },
    TextChunk { index: u32, delta: String },
    TextChunkEnd { index: u32 },
    ToolStart { id: String, name: String },
    ToolEnd { id: String, name: String },
    ToolError { id: String, name: String, error: String },
    Done { step: u64, reason: String },

    // Monitor
    StateChanged { state: String },
    BreakpointChanged { breakpoint: String },
    TokenUsage {
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    },
    Error { message: String },

    // Control
    PermissionDecision { request_id: String, decision: Value },
    Resume,
    Pause,
}

impl Event {
    /// The canonical kind string, independent of serde's tag rendering —
    /// used for `onControl`/`onMonitor` handler matching and "*" wildcards.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TextChunkStart { .. } => "text_chunk_start",
            Event::TextChunk { .. } => "text_chunk",
            Event::TextChunkEnd { .. } => "text_chunk_end",
            Event::ToolStart { .. } => "tool_start",
            Event::ToolEnd { .. } => "tool_end",
            Event::ToolError { .. } => "tool_error",
            Event::Done { .. } => "done",
            Event::StateChanged { .. } => "state_changed",
            Event::BreakpointChanged { .. } => "breakpoint_changed",
            Event::TokenUsage { .. } => "token_usage",
            Event::Error { .. } => "error",
            Event::PermissionDecision { .. } => "permission_decision",
            Event::Resume => "resume",
            Event::Pause => "pause",
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Event::TextChunkStart { .. }
            | Event::TextChunk { .. }
            | Event::TextChunkEnd { .. }
            | Event::ToolStart { .. }
            | Event::ToolEnd { .. }
            | Event::ToolError { .. }
            | Event::Done { .. } => Channel::Progress,

            Event::StateChanged { .. }
            | Event::BreakpointChanged { .. }
            | Event::TokenUsage { .. }
            | Event::Error { .. } => Channel::Monitor,

            Event::PermissionDecision { .. } | Event::Resume | Event::Pause => Channel::Control,
        }
    }
}

/// Wire unit of the bus: cursor is strictly increasing across all
/// envelopes ever emitted by a given bus, regardless of channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub cursor: i64,
    pub bookmark: Bookmark,
    pub channel: Channel,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_channel_grouping() {
        assert_eq!(Event::TextChunk { index: 0, delta: "x".into() }.channel(), Channel::Progress);
        assert_eq!(Event::StateChanged { state: "working".into() }.channel(), Channel::Monitor);
        assert_eq!(Event::Resume.channel(), Channel::Control);
    }

    #[test]
    fn kind_strings_match_canonical_names() {
        assert_eq!(Event::Done { step: 1, reason: "completed".into() }.kind(), "done");
        assert_eq!(Event::ToolError { id: "a".into(), name: "b".into(), error: "e".into() }.kind(), "tool_error");
    }
}
