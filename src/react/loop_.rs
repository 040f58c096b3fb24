//! Agent 主循环
//!
//! Plan -> 追加模型消息 -> 若有函数调用则按返回顺序逐个分发并以 Tool 角色写回结果 -> 下一轮；
//! 只有文本则终止；两者皆无则以 EmptyResponse 终止。
//! Planner 调用失败不修改历史，计入迭代次数；连续失败达到阈值即终止。

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppSection;
use crate::core::{LoopState, Termination};
use crate::llm::TokenUsage;
use crate::memory::{Conversation, FunctionCall, Message};
use crate::react::{Planner, ReactEvent};
use crate::tools::ToolExecutor;

/// 单次运行最大 Planner 往返数
pub const MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: usize,
    /// 连续 Planner 失败上限，取值 1..=max_iterations
    pub max_consecutive_failures: usize,
    pub retry_delay: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            max_consecutive_failures: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    pub fn from_app(app: &AppSection) -> Self {
        Self {
            max_iterations: app.max_iterations,
            max_consecutive_failures: app.max_consecutive_planner_failures,
            retry_delay: Duration::from_millis(app.planner_retry_delay_ms),
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        self.max_iterations = self.max_iterations.max(1);
        self.max_consecutive_failures = self
            .max_consecutive_failures
            .clamp(1, self.max_iterations);
        self
    }
}

/// 循环执行结果
#[derive(Debug)]
pub struct ReactResult {
    pub termination: Termination,
    pub history: Vec<Message>,
    pub usage: TokenUsage,
    /// 实际执行的迭代数（含 Planner 失败的轮次）
    pub iterations: usize,
}

pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub config: LoopConfig,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(planner: &'a Planner, executor: &'a ToolExecutor, config: LoopConfig) -> Self {
        Self {
            planner,
            executor,
            config: config.normalized(),
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: ReactEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

fn transition(state: &mut LoopState, next: LoopState, iteration: usize) {
    tracing::debug!(iteration, from = ?state, to = ?next, "loop state");
    *state = next;
}

pub async fn react_loop(session: &ReactSession<'_>, user_input: &str) -> ReactResult {
    let cfg = &session.config;
    let mut conversation = Conversation::new();
    conversation.push(Message::user(user_input));

    let mut state = LoopState::Running;
    let mut usage = TokenUsage::default();
    let mut iterations = 0;
    let mut consecutive_failures = 0;

    while iterations < cfg.max_iterations {
        iterations += 1;
        tracing::info!(
            iteration = iterations,
            max = cfg.max_iterations,
            messages = conversation.len(),
            backend = %session.planner.backend(),
            "calling planner"
        );

        let response = match session
            .planner
            .plan(conversation.messages(), session.executor.descriptors())
            .await
        {
            Ok(r) => {
                consecutive_failures = 0;
                r
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(
                    iteration = iterations,
                    consecutive = consecutive_failures,
                    error = %e,
                    "planner invocation failed"
                );
                session.send(ReactEvent::PlannerFailure {
                    iteration: iterations,
                    consecutive: consecutive_failures,
                    error: e.to_string(),
                });
                if consecutive_failures >= cfg.max_consecutive_failures {
                    transition(
                        &mut state,
                        LoopState::Terminated(Termination::PlannerUnavailable {
                            failures: consecutive_failures,
                            last_error: e.to_string(),
                        }),
                        iterations,
                    );
                    break;
                }
                if !cfg.retry_delay.is_zero() && iterations < cfg.max_iterations {
                    tokio::time::sleep(cfg.retry_delay).await;
                }
                continue;
            }
        };

        usage.add(response.usage);
        let message = Message::model(response.parts);
        let calls: Vec<FunctionCall> = message.function_calls().into_iter().cloned().collect();
        let text = message.text();
        conversation.push(message);

        if !calls.is_empty() {
            transition(&mut state, LoopState::AwaitingToolResults, iterations);
            if let Some(text) = text {
                session.send(ReactEvent::ModelText { text });
            }
            // 严格按返回顺序串行执行
            for call in &calls {
                session.send(ReactEvent::ToolCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                });
                let result = session.executor.dispatch(call).await;
                session.send(ReactEvent::ToolResult {
                    name: result.name.clone(),
                    text: result.text(),
                    is_error: result.is_error(),
                });
                conversation.push(Message::tool_result(result));
            }
            transition(&mut state, LoopState::Running, iterations);
            continue;
        }

        let termination = match text {
            Some(text) => Termination::FinalText { text },
            None => Termination::EmptyResponse,
        };
        transition(&mut state, LoopState::Terminated(termination), iterations);
        break;
    }

    let termination = match state {
        LoopState::Terminated(t) => t,
        _ => {
            tracing::warn!(max = cfg.max_iterations, "iteration cap reached");
            Termination::IterationCapReached {
                max_iterations: cfg.max_iterations,
            }
        }
    };

    ReactResult {
        termination,
        history: conversation.into_messages(),
        usage,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::llm::{LlmError, LlmResponse, ScriptedLlmClient};
    use crate::memory::{Part, Role};
    use crate::tools::{FileContentTool, FilesInfoTool, Sandbox, ToolRegistry, WriteFileTool};

    struct Fixture {
        _dir: tempfile::TempDir,
        llm: Arc<ScriptedLlmClient>,
        planner: Planner,
        executor: ToolExecutor,
    }

    fn fixture(script: Vec<Result<LlmResponse, LlmError>>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0123456789").unwrap();
        let mut reg = ToolRegistry::new();
        reg.register(FilesInfoTool);
        reg.register(FileContentTool::default());
        reg.register(WriteFileTool);
        let executor = ToolExecutor::new(reg, Sandbox::new(dir.path()).unwrap());
        let llm = Arc::new(ScriptedLlmClient::new(script));
        let planner = Planner::new(llm.clone(), "system");
        Fixture {
            _dir: dir,
            llm,
            planner,
            executor,
        }
    }

    fn config(max_iterations: usize, max_failures: usize) -> LoopConfig {
        LoopConfig {
            max_iterations,
            max_consecutive_failures: max_failures,
            retry_delay: Duration::ZERO,
        }
    }

    fn down() -> Result<LlmResponse, LlmError> {
        Err(LlmError::Http("connection refused".into()))
    }

    #[tokio::test]
    async fn test_immediate_final_text() {
        let f = fixture(vec![ScriptedLlmClient::text("hello there")]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "hi").await;
        assert_eq!(result.termination.final_text(), Some("hello there"));
        assert_eq!(result.iterations, 1);
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.usage.prompt_tokens, 10);
        assert_eq!(f.llm.requests()[0].system, "system");
    }

    #[tokio::test]
    async fn test_tool_call_then_answer_uses_tool_role() {
        let f = fixture(vec![
            ScriptedLlmClient::call("get_file_content", json!({ "file_path": "a.txt" })),
            ScriptedLlmClient::text("It contains digits."),
        ]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "what is in a.txt?").await;

        assert_eq!(result.termination.final_text(), Some("It contains digits."));
        let roles: Vec<Role> = result.history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::Tool, Role::Model]);
        match &result.history[2].parts[0] {
            Part::FunctionResponse(r) => assert_eq!(r.payload.as_deref(), Ok("0123456789")),
            other => panic!("unexpected part {other:?}"),
        }
        // 第二次请求带上了工具结果
        assert_eq!(f.llm.requests()[1].messages.len(), 3);
        assert_eq!(result.usage.prompt_tokens, 20);
        assert_eq!(result.usage.response_tokens, 7);
    }

    #[tokio::test]
    async fn test_calls_in_one_response_run_in_order() {
        let mut both = ScriptedLlmClient::call(
            "write_file",
            json!({ "file_path": "out.txt", "content": "fresh" }),
        )
        .unwrap();
        let read =
            ScriptedLlmClient::call("get_file_content", json!({ "file_path": "out.txt" })).unwrap();
        both.parts.extend(read.parts);
        let f = fixture(vec![Ok(both), ScriptedLlmClient::text("done")]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "write then read").await;

        assert_eq!(result.history.len(), 5);
        match &result.history[3].parts[0] {
            Part::FunctionResponse(r) => {
                assert_eq!(r.name, "get_file_content");
                assert_eq!(r.payload.as_deref(), Ok("fresh"));
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back_not_raised() {
        let f = fixture(vec![
            ScriptedLlmClient::call("get_file_content", json!({ "file_path": "../../etc/passwd" })),
            ScriptedLlmClient::call("delete_everything", json!({})),
            ScriptedLlmClient::text("I cannot do that."),
        ]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "read secrets").await;
        assert_eq!(result.termination.final_text(), Some("I cannot do that."));

        let errors: Vec<String> = result
            .history
            .iter()
            .filter(|m| m.role == Role::Tool)
            .flat_map(|m| m.parts.iter())
            .filter_map(|p| match p {
                Part::FunctionResponse(r) => Some(r.text()),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Error: Cannot read"));
        assert!(errors[1].contains("delete_everything"));
    }

    #[tokio::test]
    async fn test_consecutive_planner_failures_terminate() {
        let f = fixture((0..30).map(|_| down()).collect());
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "hi").await;
        assert!(matches!(
            result.termination,
            Termination::PlannerUnavailable { failures: 3, .. }
        ));
        assert_eq!(f.llm.request_count(), 3);
        // 失败不修改历史
        assert_eq!(result.history.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_never_exceed_iteration_cap() {
        let f = fixture((0..50).map(|_| down()).collect());
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 100));
        let result = react_loop(&session, "hi").await;
        assert_eq!(f.llm.request_count(), 20);
        assert_eq!(result.iterations, 20);
        assert!(result.termination.exit_code() != 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let f = fixture(vec![
            down(),
            down(),
            ScriptedLlmClient::call("get_files_info", json!({})),
            down(),
            down(),
            ScriptedLlmClient::text("ok"),
        ]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "hi").await;
        assert_eq!(result.termination.final_text(), Some("ok"));
        assert_eq!(result.iterations, 6);
    }

    #[tokio::test]
    async fn test_iteration_cap_reached() {
        let f = fixture(
            (0..10)
                .map(|_| ScriptedLlmClient::call("get_files_info", json!({})))
                .collect(),
        );
        let session = ReactSession::new(&f.planner, &f.executor, config(3, 3));
        let result = react_loop(&session, "loop forever").await;
        assert_eq!(
            result.termination,
            Termination::IterationCapReached { max_iterations: 3 }
        );
        assert_eq!(f.llm.request_count(), 3);
        assert!(result.termination.diagnostic().is_some());
    }

    #[tokio::test]
    async fn test_empty_response_terminates() {
        let f = fixture(vec![Ok(LlmResponse::default())]);
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3));
        let result = react_loop(&session, "hi").await;
        assert_eq!(result.termination, Termination::EmptyResponse);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let f = fixture(vec![
            down(),
            ScriptedLlmClient::call("get_files_info", json!({})),
            ScriptedLlmClient::text("done"),
        ]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = ReactSession::new(&f.planner, &f.executor, config(20, 3)).with_event_tx(&tx);
        react_loop(&session, "hi").await;
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(match ev {
                ReactEvent::PlannerFailure { .. } => "failure",
                ReactEvent::ToolCall { .. } => "call",
                ReactEvent::ToolResult { is_error, .. } => {
                    assert!(!is_error);
                    "result"
                }
                ReactEvent::ModelText { .. } => "text",
            });
        }
        assert_eq!(kinds, vec!["failure", "call", "result"]);
    }

    #[test]
    fn test_loop_config_normalization() {
        let app = AppSection {
            max_iterations: 5,
            max_consecutive_planner_failures: 50,
            ..AppSection::default()
        };
        let cfg = LoopConfig::from_app(&app);
        assert_eq!(cfg.max_consecutive_failures, 5);
        let zero = LoopConfig {
            max_iterations: 0,
            max_consecutive_failures: 0,
            retry_delay: Duration::ZERO,
        }
        .normalized();
        assert_eq!((zero.max_iterations, zero.max_consecutive_failures), (1, 1));
    }
}
