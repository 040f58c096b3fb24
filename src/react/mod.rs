//! 认知层：Planner、过程事件与 Agent 主循环

pub mod events;
pub mod loop_;
pub mod planner;

pub use events::{usage_summary, ReactEvent};
pub use loop_::{react_loop, LoopConfig, ReactResult, ReactSession, MAX_ITERATIONS};
pub use planner::{load_system_prompt, Planner, DEFAULT_SYSTEM_PROMPT};
