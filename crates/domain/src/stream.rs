//! The normalized chunk shape every provider dialect is translated onto
//! before it reaches the chunk assembler. The assembler has exactly one
//! consumer loop regardless of which wire dialect produced the stream.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Which kind of content block a `BlockStart` opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockDelta {
    TextDelta { text: String },
    JsonArgsDelta { partial_json: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

/// One event out of a provider's stream, already translated onto the
/// block-oriented shape regardless of the provider's own wire dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedChunk {
    BlockStart { index: u32, kind: BlockKind },
    BlockDelta { index: u32, delta: BlockDelta },
    BlockStop { index: u32 },
    MessageDelta {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}
