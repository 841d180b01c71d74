//! Conversation messages and content blocks.
//!
//! The block list is the one canonical internal representation (see design
//! notes): a plain string is sugar for `[ContentBlock::Text]`, never a
//! second code path. The set of block kinds is closed — dispatch on `kind`
//! via a `match`, never via reflection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A single block of message content. Variants are closed; callers match
/// exhaustively rather than probing for a kind at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    /// Emitted by the model. `id` is unique within the owning agent and must
    /// be matched by exactly one later `ToolResult` with the same id before
    /// the next model call.
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(rename = "image")]
    Image { mime: String, source: String },

    #[serde(rename = "audio")]
    Audio { mime: String, source: String },

    #[serde(rename = "video")]
    Video { mime: String, source: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        }
    }
}

/// A message in the conversation. Append-only per agent; persisted after
/// every append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// A user message whose content is the ordered tool-result blocks from
    /// one step (see §4.7 step 8 of the turn algorithm).
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        debug_assert!(results
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. })));
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// Join all `Text` blocks with `"\n"`. Non-text blocks are skipped.
    pub fn extract_all_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All `ToolUse` blocks, in encounter order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_text_is_sugar_for_single_block() {
        let m = Message::user("hello");
        assert_eq!(m.content.len(), 1);
        assert_eq!(m.extract_all_text(), "hello");
    }

    #[test]
    fn extract_all_text_skips_non_text_blocks() {
        let m = Message::assistant(vec![
            ContentBlock::text("line one"),
            ContentBlock::ToolUse {
                id: "t1".into(),
                name: "exec".into(),
                input: serde_json::json!({}),
            },
            ContentBlock::text("line two"),
        ]);
        assert_eq!(m.extract_all_text(), "line one\nline two");
    }

    #[test]
    fn tool_uses_preserves_encounter_order() {
        let m = Message::assistant(vec![
            ContentBlock::ToolUse {
                id: "a".into(),
                name: "one".into(),
                input: serde_json::json!({}),
            },
            ContentBlock::text("narration"),
            ContentBlock::ToolUse {
                id: "b".into(),
                name: "two".into(),
                input: serde_json::json!({}),
            },
        ]);
        let ids: Vec<&str> = m.tool_uses().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
