//! Anthropic-native adapter: block-oriented streaming dialect.
//!
//! Implements the Anthropic Messages API shape (system prompt as a
//! top-level field, `content_block_start/delta/stop` streaming events)
//! translated onto [`NormalizedChunk`] at the adapter boundary.

use crate::traits::{ChatOptions, ChatResponse, LlmProvider, ToolSchema};
use crate::util::{from_reqwest, resolve_api_key, send_with_retry};
use agentrt_domain::{
    BlockDelta, BlockKind, BoxStream, ContentBlock, Error, LlmCapabilities, Message,
    NormalizedChunk, Result, Role, ToolCallingFormat, Usage,
};
use serde_json::Value;
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, api_key_env: &str) -> Result<Self> {
        let api_key = resolve_api_key(api_key_env)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: "claude-sonnet-4-20250514".into(),
            capabilities: LlmCapabilities {
                tool_calling: true,
                streaming: true,
                vision: true,
                max_tokens: 8_192,
                tool_calling_format: ToolCallingFormat::Anthropic,
                ..Default::default()
            },
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, messages: &[Message], opts: &ChatOptions, stream: bool) -> Value {
        let mut api_messages: Vec<Value> = Vec::new();
        for msg in messages {
            if msg.role == Role::System {
                continue;
            }
            api_messages.push(message_to_anthropic(msg));
        }

        let mut body = serde_json::json!({
            "model": self.default_model,
            "messages": api_messages,
            "stream": stream,
            "max_tokens": opts.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = &opts.system {
            body["system"] = Value::String(system.clone());
        }
        if !opts.tools.is_empty() {
            body["tools"] = Value::Array(opts.tools.iter().map(tool_to_anthropic).collect());
        }
        if let Some(temp) = opts.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

fn message_to_anthropic(msg: &Message) -> Value {
    let role = match msg.role {
        Role::Assistant => "assistant",
        _ => "user",
    };
    let content: Vec<Value> = msg
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => serde_json::json!({"type": "text", "text": text}),
            ContentBlock::ToolUse { id, name, input } => {
                serde_json::json!({"type": "tool_use", "id": id, "name": name, "input": input})
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content,
                "is_error": is_error,
            }),
            ContentBlock::Image { mime, source } => serde_json::json!({
                "type": "image",
                "source": {"type": "base64", "media_type": mime, "data": source},
            }),
            ContentBlock::Audio { .. } | ContentBlock::Video { .. } => {
                serde_json::json!({"type": "text", "text": ""})
            }
        })
        .collect();
    serde_json::json!({"role": role, "content": content})
}

fn tool_to_anthropic(tool: &ToolSchema) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: v.get("input_tokens").and_then(|v| v.as_u64()),
        output_tokens: v.get("output_tokens").and_then(|v| v.as_u64()),
    })
}

/// Maps Anthropic content-block index -> (tool id, tool name), so a
/// `content_block_stop` can finalize the right tool-use block.
struct StreamState {
    tool_meta: HashMap<u32, (String, String)>,
    usage: Option<Usage>,
}

fn parse_sse_event(data: &str, state: &mut StreamState) -> Vec<Result<NormalizedChunk>> {
    let mut out = Vec::new();
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "message_start" => {
            if let Some(usage) = v.get("message").and_then(|m| m.get("usage")) {
                state.usage = parse_usage(usage);
            }
        }
        "content_block_start" => {
            let index = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            if let Some(block) = v.get("content_block") {
                let kind = match block.get("type").and_then(|v| v.as_str()) {
                    Some("tool_use") => {
                        let id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                        state.tool_meta.insert(index, (id.clone(), name.clone()));
                        BlockKind::ToolUse { id, name }
                    }
                    _ => BlockKind::Text,
                };
                out.push(Ok(NormalizedChunk::BlockStart { index, kind }));
            }
        }
        "content_block_delta" => {
            let index = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            if let Some(delta) = v.get("delta") {
                let delta = match delta.get("type").and_then(|v| v.as_str()) {
                    Some("text_delta") => delta
                        .get("text")
                        .and_then(|v| v.as_str())
                        .map(|t| BlockDelta::TextDelta { text: t.to_string() }),
                    Some("input_json_delta") => delta
                        .get("partial_json")
                        .and_then(|v| v.as_str())
                        .map(|j| BlockDelta::JsonArgsDelta { partial_json: j.to_string() }),
                    _ => None,
                };
                if let Some(delta) = delta {
                    out.push(Ok(NormalizedChunk::BlockDelta { index, delta }));
                }
            }
        }
        "content_block_stop" => {
            let index = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            state.tool_meta.remove(&index);
            out.push(Ok(NormalizedChunk::BlockStop { index }));
        }
        "message_delta" => {
            if let (Some(usage_val), Some(existing)) = (v.get("usage"), state.usage.as_mut()) {
                if let Some(out_tokens) = usage_val.get("output_tokens").and_then(|v| v.as_u64()) {
                    existing.output_tokens = Some(out_tokens);
                }
            }
            out.push(Ok(NormalizedChunk::MessageDelta { usage: state.usage.clone() }));
        }
        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            out.push(Err(Error::transport(msg, false)));
        }
        _ => {}
    }

    out
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn stream(
        &self,
        messages: &[Message],
        opts: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<NormalizedChunk>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(messages, opts, true);

        let resp = send_with_retry(|| self.authed_post(&url).json(&body), opts.max_retries, &opts.agent_id).await?;

        let mut state = StreamState {
            tool_meta: HashMap::new(),
            usage: None,
        };
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_sse_event(data, &mut state)))
    }

    async fn complete(&self, messages: &[Message], opts: &ChatOptions) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(messages, opts, false);

        let resp = send_with_retry(|| self.authed_post(&url).json(&body), opts.max_retries, &opts.agent_id).await?;
        let text = resp.text().await.map_err(from_reqwest)?;

        let body: Value = serde_json::from_str(&text)?;
        let blocks: Vec<ContentBlock> = body
            .get("content")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| match b.get("type").and_then(|v| v.as_str()) {
                Some("text") => Some(ContentBlock::text(b.get("text")?.as_str()?.to_string())),
                Some("tool_use") => Some(ContentBlock::ToolUse {
                    id: b.get("id")?.as_str()?.to_string(),
                    name: b.get("name")?.as_str()?.to_string(),
                    input: b.get("input").cloned().unwrap_or(Value::Object(Default::default())),
                }),
                _ => None,
            })
            .collect();

        Ok(ChatResponse {
            message: Message::assistant(blocks),
            model: body.get("model").and_then(|v| v.as_str()).unwrap_or(&self.default_model).to_string(),
            finish_reason: body.get("stop_reason").and_then(|v| v.as_str()).map(str::to_string),
            usage: body.get("usage").and_then(parse_usage),
        })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_produces_block_delta_chunk() {
        let mut state = StreamState { tool_meta: HashMap::new(), usage: None };
        let chunks = parse_sse_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"he"}}"#,
            &mut state,
        );
        assert_eq!(chunks.len(), 1);
        match chunks.into_iter().next().unwrap().unwrap() {
            NormalizedChunk::BlockDelta { index, delta: BlockDelta::TextDelta { text } } => {
                assert_eq!(index, 0);
                assert_eq!(text, "he");
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn tool_use_block_start_tracks_id_and_name() {
        let mut state = StreamState { tool_meta: HashMap::new(), usage: None };
        let chunks = parse_sse_event(
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"t1","name":"exec"}}"#,
            &mut state,
        );
        assert!(state.tool_meta.contains_key(&1));
        match chunks.into_iter().next().unwrap().unwrap() {
            NormalizedChunk::BlockStart { kind: BlockKind::ToolUse { id, name }, .. } => {
                assert_eq!(id, "t1");
                assert_eq!(name, "exec");
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn message_delta_carries_running_usage() {
        let mut state = StreamState {
            tool_meta: HashMap::new(),
            usage: Some(Usage { input_tokens: Some(2), output_tokens: None }),
        };
        let chunks = parse_sse_event(
            r#"{"type":"message_delta","usage":{"output_tokens":5}}"#,
            &mut state,
        );
        match chunks.into_iter().next().unwrap().unwrap() {
            NormalizedChunk::MessageDelta { usage: Some(u) } => {
                assert_eq!(u.input_tokens, Some(2));
                assert_eq!(u.output_tokens, Some(5));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn error_event_surfaces_as_transport_error() {
        let mut state = StreamState { tool_meta: HashMap::new(), usage: None };
        let chunks = parse_sse_event(r#"{"type":"error","error":{"message":"overloaded"}}"#, &mut state);
        assert!(chunks[0].is_err());
    }
}
