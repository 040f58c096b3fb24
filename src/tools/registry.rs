//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! ToolRegistry 启动时一次性构建：按名注册，并按注册顺序缓存 ToolDescriptor 作为工具目录。
//! 工作目录不属于任何工具的参数，由 ToolExecutor 通过 ToolContext 注入。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{ErrorKind, ToolError, ToolOutcome};
use crate::tools::schema::{empty_object_schema, ToolDescriptor};
use crate::tools::Sandbox;

/// 分发时注入的隐式参数
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub sandbox: &'a Sandbox,
}

/// 工具 trait
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Planner 调用时使用）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        empty_object_schema()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, args: Value) -> ToolOutcome;
}

/// 把 Planner 给出的 JSON 参数解析为工具的参数结构体
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| {
        ToolError::new(
            ErrorKind::InvalidArguments,
            format!("Invalid arguments for {tool}: {e}"),
        )
    })
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具后注册者覆盖先注册者
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        let descriptor = ToolDescriptor {
            name: name.clone(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        };
        self.descriptors.retain(|d| d.name != name);
        self.descriptors.push(descriptor);
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 工具目录（注册顺序）
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            self.1
        }

        async fn execute(&self, _ctx: &ToolContext<'_>, _args: Value) -> ToolOutcome {
            Ok(self.1.to_string())
        }
    }

    #[test]
    fn test_descriptors_keep_registration_order() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("b", "first"));
        reg.register(Named("a", "second"));
        assert_eq!(reg.tool_names(), vec!["b", "a"]);
        assert_eq!(reg.descriptors()[0].parameters["type"], "object");
    }

    #[test]
    fn test_reregister_replaces_descriptor() {
        let mut reg = ToolRegistry::new();
        reg.register(Named("a", "old"));
        reg.register(Named("a", "new"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.descriptors().len(), 1);
        assert_eq!(reg.descriptors()[0].description, "new");
    }

    #[test]
    fn test_parse_args_reports_tool_name() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Args {
            file_path: String,
        }
        let err = parse_args::<Args>("get_file_content", serde_json::json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArguments);
        assert!(err.message.contains("get_file_content"));
    }
}
