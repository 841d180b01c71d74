//! Consumes a provider's normalized chunk stream and assembles the final
//! assistant [`Message`], emitting Progress/Monitor events as it goes. The
//! assembler never branches on which wire dialect produced the stream --
//! every provider already translates onto [`NormalizedChunk`].

use agentrt_domain::{
    BlockDelta, BlockKind, BoxStream, Channel, ContentBlock, Error, Event, Message, NormalizedChunk, Result,
};
use agentrt_eventbus::EventBus;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

struct BlockAccum {
    kind: BlockKind,
    text: String,
    json_buf: String,
}

fn ensure_len(blocks: &mut Vec<Option<BlockAccum>>, index: u32) {
    let idx = index as usize;
    if blocks.len() <= idx {
        blocks.resize_with(idx + 1, || None);
    }
}

/// Drains `chunks` to completion or cancellation, maintaining an ordered
/// block vector indexed by chunk index. Text deltas append to the block's
/// text and emit `TextChunk`; tool-use blocks accumulate `jsonArgsDelta`
/// fragments in a per-index buffer, parsed once at the end. A parse
/// failure yields an empty input object rather than failing the turn --
/// the downstream tool call rejects it by schema instead.
///
/// Always returns the message assembled so far, even on cancellation or a
/// stream error -- the caller decides whether a partial message is worth
/// keeping. `Ok(())` means the stream ran to completion; an `Err` means the
/// message is partial and names why assembly stopped.
pub async fn assemble_stream(
    bus: &EventBus,
    cancel: &CancellationToken,
    mut chunks: BoxStream<'static, Result<NormalizedChunk>>,
) -> (Message, Result<()>) {
    let mut blocks: Vec<Option<BlockAccum>> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (finalize(blocks), Err(Error::Cancelled)),
            next = chunks.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return (finalize(blocks), Err(e)),
        };
        match chunk {
            NormalizedChunk::BlockStart { index, kind } => {
                ensure_len(&mut blocks, index);
                if matches!(kind, BlockKind::Text) {
                    bus.emit(Channel::Progress, Event::TextChunkStart { index });
                }
                blocks[index as usize] = Some(BlockAccum { kind, text: String::new(), json_buf: String::new() });
            }
            NormalizedChunk::BlockDelta { index, delta } => {
                ensure_len(&mut blocks, index);
                if let Some(block) = blocks.get_mut(index as usize).and_then(|b| b.as_mut()) {
                    match delta {
                        BlockDelta::TextDelta { text } => {
                            block.text.push_str(&text);
                            bus.emit(Channel::Progress, Event::TextChunk { index, delta: text });
                        }
                        BlockDelta::JsonArgsDelta { partial_json } => block.json_buf.push_str(&partial_json),
                    }
                }
            }
            NormalizedChunk::BlockStop { index } => {
                if let Some(Some(block)) = blocks.get(index as usize) {
                    if matches!(block.kind, BlockKind::Text) {
                        bus.emit(Channel::Progress, Event::TextChunkEnd { index });
                    }
                }
            }
            NormalizedChunk::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    bus.emit(
                        Channel::Monitor,
                        Event::TokenUsage { input_tokens: usage.input_tokens, output_tokens: usage.output_tokens },
                    );
                }
            }
        }
    }

    (finalize(blocks), Ok(()))
}

fn finalize(blocks: Vec<Option<BlockAccum>>) -> Message {
    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks.into_iter().flatten() {
        match block.kind {
            BlockKind::Text => content.push(ContentBlock::text(block.text)),
            BlockKind::ToolUse { id, name } => {
                let input = parse_tool_input(&name, &block.json_buf);
                content.push(ContentBlock::ToolUse { id, name, input });
            }
        }
    }
    Message::assistant(content)
}

fn parse_tool_input(tool_name: &str, json_buf: &str) -> serde_json::Value {
    if json_buf.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(json_buf).unwrap_or_else(|e| {
        tracing::warn!(tool = %tool_name, error = %e, "tool-use arguments failed to parse; defaulting to empty object");
        serde_json::json!({})
    })
}
