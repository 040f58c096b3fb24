//! Google Gemini 客户端（generateContent REST）
//!
//! 工具结果以 functionResponse 片段、user 角色发送；相邻的工具结果合并为一条 content。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::traits::{http_client, read_json};
use crate::llm::{LlmClient, LlmError, LlmResponse, TokenUsage};
use crate::memory::{FunctionCall, Message, Part, Role};
use crate::tools::ToolDescriptor;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl GeminiClient {
    /// `api_key` 为 None 时不在此处报错，调用 complete 时返回 MissingApiKey
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
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
        }
    }
}

/// 转为 Gemini 请求体
pub fn build_request_body(system: &str, messages: &[Message], tools: &[ToolDescriptor]) -> Value {
    let mut contents: Vec<Value> = Vec::new();
    let mut last_was_tool = false;

    for msg in messages {
        let parts: Vec<Value> = msg.parts.iter().map(part_to_json).collect();
        if msg.role == Role::Tool && last_was_tool {
            if let Some(prev) = contents.last_mut().and_then(|c| c["parts"].as_array_mut()) {
                prev.extend(parts);
                continue;
            }
        }
        let role = match msg.role {
            Role::Model => "model",
            Role::User | Role::Tool => "user",
        };
        contents.push(json!({ "role": role, "parts": parts }));
        last_was_tool = msg.role == Role::Tool;
    }

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }
    body
}

fn part_to_json(part: &Part) -> Value {
    match part {
        Part::Text(t) => json!({ "text": t }),
        Part::FunctionCall(fc) => json!({
            "functionCall": { "name": fc.name, "args": fc.args }
        }),
        Part::FunctionResponse(r) => {
            let response = match &r.payload {
                Ok(s) => json!({ "result": s }),
                Err(e) => json!({ "error": e.message }),
            };
            json!({ "functionResponse": { "name": r.name, "response": response } })
        }
    }
}

/// 解析 generateContent 响应：取首个 candidate 的 text / functionCall 片段与 usageMetadata
pub fn parse_response(parsed: &Value) -> Result<LlmResponse, LlmError> {
    if !parsed.is_object() {
        return Err(LlmError::InvalidResponse(format!(
            "expected JSON object, got {parsed}"
        )));
    }

    let mut parts = Vec::new();
    let raw_parts = parsed
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    for part in raw_parts.into_iter().flatten() {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            parts.push(Part::Text(text.to_string()));
        }
        if let Some(fc) = part.get("functionCall") {
            let name = fc
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| LlmError::InvalidResponse("functionCall without name".into()))?;
            parts.push(Part::FunctionCall(FunctionCall {
                id: fc
                    .get("id")
                    .and_then(|i| i.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: name.to_string(),
                args: fc.get("args").cloned().unwrap_or_else(|| json!({})),
            }));
        }
    }

    let meta = parsed.get("usageMetadata");
    let count = |key: &str| {
        meta.and_then(|u| u.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    Ok(LlmResponse {
        parts,
        usage: TokenUsage::new(count("promptTokenCount"), count("candidatesTokenCount")),
    })
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
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
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = build_request_body(system, messages, tools);

        tracing::debug!(model = %self.model, messages = messages.len(), "calling Gemini API");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let parsed = read_json(response).await?;
        parse_response(&parsed)
    }
}
