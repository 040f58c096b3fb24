//! 错误类型
//!
//! 两层：工具层的 ErrorKind / ToolError 只会作为结果负载回给 Planner，不会中断循环；
//! AgentError 是启动期的进程级错误（配置、工作目录）。Planner 调用失败见 llm::LlmError。

use thiserror::Error;

/// 工具层错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 路径逃逸出工作目录
    SandboxViolation,
    /// 文件 / 目录 / 脚本不存在
    NotFound,
    /// 脚本后缀不符
    NotExecutableKind,
    ExecutionTimeout,
    ExecutionFailure,
    UnknownTool,
    /// Planner 给出的参数与声明的 schema 不符
    InvalidArguments,
    /// 其它文件系统错误（非 UTF-8 内容、写到目录上等）
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SandboxViolation => "sandbox_violation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotExecutableKind => "not_executable_kind",
            ErrorKind::ExecutionTimeout => "execution_timeout",
            ErrorKind::ExecutionFailure => "execution_failure",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带分类的工具错误；message 是给 Planner 看的描述
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SandboxViolation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }
}

/// 工具调用的结果通道：成功文本或带分类的错误
pub type ToolOutcome = Result<String, ToolError>;

/// 进程级错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    /// 工作目录无法规范化（不存在或无权限）
    #[error("Invalid working directory {path}: {reason}")]
    WorkingDirectory { path: String, reason: String },
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}
