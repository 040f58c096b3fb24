//! 记忆层：单次运行内的对话历史（不做跨进程持久化）

pub mod conversation;

pub use conversation::{Conversation, FunctionCall, FunctionResult, Message, Part, Role};
