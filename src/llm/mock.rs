//! 离线 LLM 客户端（测试与无 API 演示）
//!
//! - MockLlmClient：首轮调用 get_files_info，拿到工具结果后把结果作为最终回复。
//! - ScriptedLlmClient：按顺序回放预设的回复 / 失败，并记录每次请求。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, LlmResponse, TokenUsage};
use crate::memory::{FunctionCall, Message, Part, Role};
use crate::tools::ToolDescriptor;

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        let last = messages
            .last()
            .ok_or_else(|| LlmError::InvalidResponse("empty history".into()))?;

        if last.role == Role::Tool {
            let observations: Vec<String> = last
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::FunctionResponse(r) => Some(format!("{}:\n{}", r.name, r.text())),
                    _ => None,
                })
                .collect();
            return Ok(LlmResponse::text(format!(
                "Mock result from {}",
                observations.join("\n")
            )));
        }

        if tools.iter().any(|t| t.name == "get_files_info") {
            return Ok(LlmResponse {
                parts: vec![Part::FunctionCall(FunctionCall {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: "get_files_info".into(),
                    args: serde_json::json!({}),
                })],
                usage: TokenUsage::default(),
            });
        }

        Ok(LlmResponse::text(format!(
            "Echo from Mock: {}",
            last.text().unwrap_or_default()
        )))
    }
}

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// 回放脚本；脚本耗尽后每次调用返回 InvalidResponse
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 回复一个函数调用
    pub fn call(name: &str, args: serde_json::Value) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            parts: vec![Part::FunctionCall(FunctionCall {
                id: format!("call-{name}"),
                name: name.to_string(),
                args,
            })],
            usage: TokenUsage::new(10, 2),
        })
    }

    pub fn text(text: &str) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            parts: vec![Part::Text(text.to_string())],
            usage: TokenUsage::new(10, 5),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system: system.to_string(),
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".into())))
    }
}
