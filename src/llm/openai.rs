//! OpenAI 兼容 Chat Completions 客户端
//!
//! 可配置 base_url，适用于 OpenAI、DeepSeek、自建代理等；工具以 `tools` 广播，
//! 工具结果以 role=tool + tool_call_id 回传。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::traits::{http_client, read_json};
use crate::llm::{LlmClient, LlmError, LlmResponse, TokenUsage};
use crate::memory::{FunctionCall, Message, Part, Role};
use crate::tools::ToolDescriptor;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<String>,
        api_key_env: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
        }
    }
}

pub fn build_request_body(
    model: &str,
    system: &str,
    messages: &[Message],
    tools: &[ToolDescriptor],
) -> Value {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        out.push(json!({ "role": "system", "content": system }));
    }

    for msg in messages {
        match msg.role {
            Role::User => out.push(json!({
                "role": "user",
                "content": msg.text().unwrap_or_default(),
            })),
            Role::Model => {
                let tool_calls: Vec<Value> = msg
                    .function_calls()
                    .into_iter()
                    .map(|fc| {
                        json!({
                            "id": fc.id,
                            "type": "function",
                            "function": { "name": fc.name, "arguments": fc.args.to_string() },
                        })
                    })
                    .collect();
                let mut m = json!({ "role": "assistant", "content": msg.text() });
                if !tool_calls.is_empty() {
                    m["tool_calls"] = Value::Array(tool_calls);
                }
                out.push(m);
            }
            Role::Tool => {
                for part in &msg.parts {
                    if let Part::FunctionResponse(r) = part {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": r.call_id,
                            "content": r.text(),
                        }));
                    }
                }
            }
        }
    }

    let mut body = json!({ "model": model, "messages": out });
    if !tools.is_empty() {
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }
    body
}

/// 解析首个 choice；arguments 不是合法 JSON 时原样保留为字符串，交给工具参数校验报错
pub fn parse_response(parsed: &Value) -> Result<LlmResponse, LlmError> {
    let message = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;

    let mut parts = Vec::new();
    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            parts.push(Part::Text(text.to_string()));
        }
    }
    for tc in message
        .get("tool_calls")
        .and_then(|t| t.as_array())
        .into_iter()
        .flatten()
    {
        let function = tc
            .get("function")
            .ok_or_else(|| LlmError::InvalidResponse("tool call without function".into()))?;
        let name = function
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| LlmError::InvalidResponse("tool call without name".into()))?;
        let raw_args = function
            .get("arguments")
            .and_then(|a| a.as_str())
            .unwrap_or("{}");
        let args = serde_json::from_str(raw_args).unwrap_or_else(|_| Value::String(raw_args.to_string()));
        parts.push(Part::FunctionCall(FunctionCall {
            id: tc
                .get("id")
                .and_then(|i| i.as_str())
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: name.to_string(),
            args,
        }));
    }

    let usage = parsed.get("usage");
    let count = |key: &str| {
        usage
            .and_then(|u| u.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    Ok(LlmResponse {
        parts,
        usage: TokenUsage::new(count("prompt_tokens"), count("completion_tokens")),
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))?;
        let body = build_request_body(&self.model, system, messages, tools);

        tracing::debug!(model = %self.model, messages = messages.len(), "calling chat completions");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let parsed = read_json(response).await?;
        parse_response(&parsed)
    }
}
