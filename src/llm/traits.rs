//! LLM 客户端抽象
//!
//! 所有后端（Gemini / OpenAI 兼容 / Mock）实现 LlmClient：给定 system、完整历史与工具目录，
//! 返回一条模型消息（文本和/或结构化函数调用）以及本次 token 用量。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{Message, Part};
use crate::tools::ToolDescriptor;

/// 单次 / 累计 token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, response_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            response_tokens,
        }
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

/// Planner 的一次回复
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub parts: Vec<Part>,
    pub usage: TokenUsage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
            usage: TokenUsage::default(),
        }
    }
}

/// Planner 调用失败（网络、服务端、响应格式、缺凭据）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 凭据环境变量未设置；启动时不校验，首次调用时报出
    #[error("API key not set (expected environment variable {0})")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.to_string())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 后端名（日志用）
    fn name(&self) -> &str;

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError>;
}

/// 构建 HTTP 客户端；timeout 为 None 时不设请求超时
pub(crate) fn http_client(timeout: Option<std::time::Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to build http client, using defaults");
        reqwest::Client::new()
    })
}

/// 非 2xx 时读出 body 作为错误
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}
