//! 循环状态机
//!
//! Running -> (有工具调用) AwaitingToolResults -> Running ... -> Terminated(..)

use serde::Serialize;

/// 循环控制器的阶段
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Running,
    AwaitingToolResults,
    Terminated(Termination),
}

/// 终止原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// Planner 给出了最终文本
    FinalText { text: String },
    /// 既无工具调用也无文本
    EmptyResponse,
    /// 用完迭代上限仍未得到最终回复
    IterationCapReached { max_iterations: usize },
    /// 连续 Planner 调用失败达到阈值
    PlannerUnavailable { failures: usize, last_error: String },
}

impl Termination {
    /// 进程退出码：0 表示得到最终回复
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::FinalText { .. } => 0,
            Termination::EmptyResponse => 3,
            Termination::IterationCapReached { .. } => 4,
            Termination::PlannerUnavailable { .. } => 5,
        }
    }

    pub fn final_text(&self) -> Option<&str> {
        match self {
            Termination::FinalText { text } => Some(text),
            _ => None,
        }
    }

    /// 非成功终止时给用户的诊断
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Termination::FinalText { .. } => None,
            Termination::EmptyResponse => {
                Some("No text or function calls returned.".to_string())
            }
            Termination::IterationCapReached { max_iterations } => Some(format!(
                "Stopped after {max_iterations} iterations without a final answer."
            )),
            Termination::PlannerUnavailable {
                failures,
                last_error,
            } => Some(format!(
                "Planner failed {failures} times in a row; giving up. Last error: {last_error}"
            )),
        }
    }
}
