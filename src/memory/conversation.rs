//! 对话历史
//!
//! 只追加、不剪枝；顺序是唯一的排序保证。工具结果使用独立的 Tool 角色。

use serde::{Deserialize, Serialize};

use crate::core::ToolOutcome;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// Planner 发起的结构化调用
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// 后端给出的调用 id（Gemini 可能不给，由客户端生成）
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// 一次分发的结果
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionResult {
    pub call_id: String,
    pub name: String,
    pub payload: ToolOutcome,
}

impl FunctionResult {
    /// 给 Planner 与日志看的文本形式：错误统一加 "Error: " 前缀
    pub fn text(&self) -> String {
        match &self.payload {
            Ok(s) => s.clone(),
            Err(e) => format!("Error: {}", e.message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.payload.is_err()
    }
}

/// 消息内容片段
#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResult),
}

/// 单条消息
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(content.into())],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    pub fn tool_result(result: FunctionResult) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![Part::FunctionResponse(result)],
        }
    }

    /// 按出现顺序返回全部函数调用
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }

    /// 拼接全部文本片段；没有文本或全是空白时返回 None
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// 只追加的对话历史
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
