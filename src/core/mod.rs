//! 核心层：错误分类与循环状态

pub mod error;
pub mod state;

pub use error::{AgentError, ErrorKind, ToolError, ToolOutcome};
pub use state::{LoopState, Termination};
