//! OpenAI-compatible adapter: one `choices[0].delta` per SSE event,
//! optional `tool_calls[]`, translated onto the block-oriented
//! [`NormalizedChunk`] shape at this boundary so the engine has exactly
//! one assembler regardless of dialect.

use crate::traits::{ChatOptions, ChatResponse, LlmProvider, ToolSchema};
use crate::util::{from_reqwest, resolve_api_key, send_with_retry};
use agentrt_domain::{
    BlockDelta, BlockKind, BoxStream, ContentBlock, Error, LlmCapabilities, Message,
    NormalizedChunk, Result, Role, ToolCallingFormat, Usage,
};
use serde_json::Value;
use std::collections::HashMap;

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
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
            default_model: "gpt-4o".into(),
            capabilities: LlmCapabilities {
                tool_calling: true,
                streaming: true,
                vision: true,
                json_mode: true,
                max_tokens: 16_384,
                tool_calling_format: ToolCallingFormat::Openai,
                ..Default::default()
            },
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, messages: &[Message], opts: &ChatOptions, stream: bool) -> Value {
        let mut api_messages: Vec<Value> = Vec::new();
        if let Some(system) = &opts.system {
            api_messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in messages {
            api_messages.push(message_to_openai(msg));
        }

        let mut body = serde_json::json!({
            "model": self.default_model,
            "messages": api_messages,
            "stream": stream,
        });
        if !opts.tools.is_empty() {
            body["tools"] = Value::Array(opts.tools.iter().map(tool_to_openai).collect());
        }
        if let Some(temp) = opts.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = opts.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

/// Every dialect requires a separate top-level `tool` message per result,
/// carrying `tool_call_id`, rather than block-oriented `toolResult` blocks.
fn message_to_openai(msg: &Message) -> Value {
    if msg.role == Role::User && msg.content.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. })) {
        // OpenAI has no batched tool-result message: emit one per block and
        // let the caller flatten — we return the first and note the rest
        // must be separate top-level entries (handled by `build_body`'s caller).
        // In practice a turn only ever has one pending ToolResult per message
        // in this dialect's representation, so we fold to an array here.
        return Value::Array(
            msg.content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult { tool_use_id, content, .. } => Some(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    })),
                    _ => None,
                })
                .collect(),
        );
    }

    if msg.role == Role::Assistant {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => text_parts.push(text.clone()),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": input.to_string()},
                    }));
                }
                _ => {}
            }
        }
        let mut obj = serde_json::json!({"role": "assistant"});
        obj["content"] = if text_parts.is_empty() {
            Value::Null
        } else {
            Value::String(text_parts.join("\n"))
        };
        if !tool_calls.is_empty() {
            obj["tool_calls"] = Value::Array(tool_calls);
        }
        return obj;
    }

    serde_json::json!({
        "role": if msg.role == Role::System { "system" } else { "user" },
        "content": msg.extract_all_text(),
    })
}

fn tool_to_openai(tool: &ToolSchema) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {"name": tool.name, "description": tool.description, "parameters": tool.parameters},
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: v.get("prompt_tokens").and_then(|v| v.as_u64()),
        output_tokens: v.get("completion_tokens").and_then(|v| v.as_u64()),
    })
}

struct ToolState {
    id: String,
    name: String,
}

/// OpenAI indexes the text block implicitly (there's only ever one) and
/// tool calls by their own zero-based `index`. We reserve normalized index
/// 0 for text and shift tool indices by one so both share one index space.
struct StreamState {
    text_started: bool,
    tools: HashMap<u32, ToolState>,
}

fn tool_block_index(openai_index: u32) -> u32 {
    openai_index + 1
}

fn parse_sse_event(data: &str, state: &mut StreamState) -> Vec<Result<NormalizedChunk>> {
    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let mut out = Vec::new();
    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());

    let choice = match choice {
        Some(c) => c,
        None => {
            if let Some(usage) = v.get("usage").and_then(parse_usage) {
                out.push(Ok(NormalizedChunk::MessageDelta { usage: Some(usage) }));
            }
            return out;
        }
    };

    let delta = choice.get("delta").cloned().unwrap_or(Value::Null);

    if let Some(tool_calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tool_calls {
            let openai_index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let index = tool_block_index(openai_index);

            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                state.tools.insert(openai_index, ToolState { id: id.to_string(), name: name.clone() });
                out.push(Ok(NormalizedChunk::BlockStart {
                    index,
                    kind: BlockKind::ToolUse { id: id.to_string(), name },
                }));
            }

            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                if !args.is_empty() {
                    out.push(Ok(NormalizedChunk::BlockDelta {
                        index,
                        delta: BlockDelta::JsonArgsDelta { partial_json: args.to_string() },
                    }));
                }
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            if !state.text_started {
                state.text_started = true;
                out.push(Ok(NormalizedChunk::BlockStart { index: 0, kind: BlockKind::Text }));
            }
            out.push(Ok(NormalizedChunk::BlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta { text: text.to_string() },
            }));
        }
    }

    if choice.get("finish_reason").and_then(|v| v.as_str()).is_some() {
        if state.text_started {
            out.push(Ok(NormalizedChunk::BlockStop { index: 0 }));
        }
        for openai_index in state.tools.keys().copied().collect::<Vec<_>>() {
            out.push(Ok(NormalizedChunk::BlockStop { index: tool_block_index(openai_index) }));
        }
        let usage = v.get("usage").and_then(parse_usage);
        out.push(Ok(NormalizedChunk::MessageDelta { usage }));
    }

    out
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn stream(
        &self,
        messages: &[Message],
        opts: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<NormalizedChunk>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(messages, opts, true);

        let resp = send_with_retry(|| self.authed_post(&url).json(&body), opts.max_retries, &opts.agent_id).await?;

        let mut state = StreamState { text_started: false, tools: HashMap::new() };
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_sse_event(data, &mut state)))
    }

    async fn complete(&self, messages: &[Message], opts: &ChatOptions) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(messages, opts, false);

        let resp = send_with_retry(|| self.authed_post(&url).json(&body), opts.max_retries, &opts.agent_id).await?;
        let text = resp.text().await.map_err(from_reqwest)?;

        let body: Value = serde_json::from_str(&text)?;
        let choice = body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .ok_or_else(|| Error::Protocol("no choices in response".into()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| Error::Protocol("no message in choice".into()))?;

        let mut blocks = Vec::new();
        if let Some(text) = message.get("content").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                blocks.push(ContentBlock::text(text));
            }
        }
        if let Some(tool_calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
            for tc in tool_calls {
                let id = tc.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let func = tc.get("function");
                let name = func.and_then(|f| f.get("name")).and_then(|v| v.as_str()).unwrap_or("").to_string();
                let args_str = func.and_then(|f| f.get("arguments")).and_then(|v| v.as_str()).unwrap_or("{}");
                let input = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
                blocks.push(ContentBlock::ToolUse { id, name, input });
            }
        }

        Ok(ChatResponse {
            message: Message::assistant(blocks),
            model: body.get("model").and_then(|v| v.as_str()).unwrap_or(&self.default_model).to_string(),
            finish_reason: choice.get("finish_reason").and_then(|v| v.as_str()).map(str::to_string),
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
