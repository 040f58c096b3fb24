//! Planner：持有 LLM 与 system prompt，把完整历史与工具目录交给后端

use std::path::Path;
use std::sync::Arc;

use crate::llm::{LlmClient, LlmError, LlmResponse};
use crate::memory::Message;
use crate::tools::ToolDescriptor;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI coding agent.

When a user asks a question or makes a request, make a function call plan. You can perform the following operations:

- List files and directories
- Read file contents
- Execute Python files with optional arguments
- Write or overwrite files

All paths you provide should be relative to the working directory. You do not need to specify the working directory in your function calls as it is automatically injected for security reasons.
";

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn backend(&self) -> &str {
        self.llm.name()
    }

    pub async fn plan(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        self.llm.complete(&self.system_prompt, messages, tools).await
    }
}

/// 读取自定义 system prompt；未配置或读取失败时使用默认值
pub fn load_system_prompt(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => s,
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read system prompt, using default");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}
