//! Warden - 沙箱化的 LLM 工具调用智能体
//!
//! 模块划分：
//! - **agent**: 运行时装配（LLM 后端、工具目录、Sandbox）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与循环状态
//! - **llm**: Planner 后端抽象与实现（Gemini / OpenAI 兼容 / Mock）
//! - **memory**: 单次运行内的对话历史
//! - **react**: Planner 与 Agent 主循环
//! - **tools**: 沙箱路径解析、文件与脚本工具、注册表与分发器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{create_agent_components, AgentComponents};
