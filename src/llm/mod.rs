//! LLM 层：Planner 后端抽象与实现（Gemini / OpenAI 兼容 / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

pub use gemini::GeminiClient;
pub use mock::{MockLlmClient, RecordedRequest, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError, LlmResponse, TokenUsage};
