//! 工具执行器（分发器）
//!
//! 持有 ToolRegistry 与 Sandbox；dispatch(call) 按名查找工具，注入工作目录后执行，
//! 结果统一包成 FunctionResult，从不向调用方抛错；每次调用输出结构化审计日志（JSON）。

use std::time::Instant;

use crate::core::{ErrorKind, ToolError};
use crate::memory::{FunctionCall, FunctionResult};
use crate::tools::{Sandbox, ToolContext, ToolDescriptor, ToolRegistry};

pub struct ToolExecutor {
    registry: ToolRegistry,
    sandbox: Sandbox,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, sandbox: Sandbox) -> Self {
        Self { registry, sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// 广播给 Planner 的工具目录
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        self.registry.descriptors()
    }

    pub async fn dispatch(&self, call: &FunctionCall) -> FunctionResult {
        let start = Instant::now();
        let args_preview = args_preview(&call.args);
        // 部分后端对无参调用给 null
        let args = if call.args.is_null() {
            serde_json::json!({})
        } else {
            call.args.clone()
        };

        let payload = match self.registry.get(&call.name) {
            Some(tool) => {
                let ctx = ToolContext {
                    sandbox: &self.sandbox,
                };
                tool.execute(&ctx, args).await
            }
            None => Err(ToolError::new(
                ErrorKind::UnknownTool,
                format!("Unknown function: {}", call.name),
            )),
        };

        let outcome = match &payload {
            Ok(_) => "ok",
            Err(e) => e.kind.as_str(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "ok": payload.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        FunctionResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            payload,
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
