//! 循环过程事件：供 CLI 等前端展示工具调用与结果

use serde::Serialize;

use crate::llm::TokenUsage;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 与函数调用一同返回的文本（不作为最终回复）
    ModelText { text: String },
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
    ToolResult {
        name: String,
        text: String,
        is_error: bool,
    },
    /// Planner 调用失败，本轮跳过
    PlannerFailure {
        iteration: usize,
        consecutive: usize,
        error: String,
    },
}

impl ReactEvent {
    /// CLI 展示文本；默认只显示调用的工具名，verbose 时附带参数与结果。
    /// 返回 None 表示当前模式下不展示。
    pub fn render(&self, verbose: bool) -> Option<String> {
        match self {
            ReactEvent::ModelText { text } => verbose.then(|| text.clone()),
            ReactEvent::ToolCall { name, args } => Some(if verbose {
                format!("Calling function: {name}({args})")
            } else {
                format!(" - Calling function: {name}")
            }),
            ReactEvent::ToolResult { text, .. } => verbose.then(|| format!("-> {text}")),
            ReactEvent::PlannerFailure {
                iteration,
                consecutive,
                error,
            } => Some(format!(
                "Error calling planner (iteration {iteration}, {consecutive} in a row): {error}"
            )),
        }
    }

    /// 是否写到 stderr
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, ReactEvent::PlannerFailure { .. })
    }
}

/// verbose 模式下运行结束时的统计
pub fn usage_summary(prompt: &str, usage: &TokenUsage) -> String {
    format!(
        "User prompt: {prompt}\nPrompt tokens: {}\nResponse tokens: {}",
        usage.prompt_tokens, usage.response_tokens
    )
}
