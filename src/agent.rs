//! Agent 运行时装配
//!
//! 从配置构建 LLM 后端、工具目录与 Sandbox，得到 AgentComponents；
//! run 对单条用户输入跑主循环并返回结果。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{GeminiClient, LlmClient, MockLlmClient, OpenAiClient};
use crate::react::{load_system_prompt, react_loop, LoopConfig, Planner, ReactEvent, ReactResult, ReactSession};
use crate::tools::{builtin_registry, Sandbox, ToolExecutor};

pub struct AgentComponents {
    pub planner: Planner,
    pub executor: ToolExecutor,
    pub loop_config: LoopConfig,
}

impl AgentComponents {
    pub async fn run(
        &self,
        prompt: &str,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> ReactResult {
        let mut session = ReactSession::new(&self.planner, &self.executor, self.loop_config.clone());
        if let Some(tx) = event_tx {
            session = session.with_event_tx(tx);
        }
        react_loop(&session, prompt).await
    }
}

/// 按 llm.provider 选择后端；凭据环境变量只在此处读取一次，缺失时不报错
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let llm = &cfg.llm;
    let api_key = std::env::var(&llm.api_key_env).ok().filter(|k| !k.is_empty());
    let timeout = (llm.timeouts.request > 0).then(|| Duration::from_secs(llm.timeouts.request));

    let client: Arc<dyn LlmClient> = match llm.provider.as_str() {
        "gemini" => Arc::new(GeminiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            api_key,
            &llm.api_key_env,
            timeout,
        )),
        "openai" => Arc::new(OpenAiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            api_key,
            &llm.api_key_env,
            timeout,
        )),
        "mock" => Arc::new(MockLlmClient),
        other => {
            return Err(AgentError::ConfigError(format!(
                "unknown llm provider '{other}' (expected gemini, openai or mock)"
            )))
        }
    };
    tracing::info!(provider = %llm.provider, model = %llm.model, "llm backend ready");
    Ok(client)
}

/// 用已构建的 LLM 组装组件；workspace 必须已存在
pub fn create_agent_components_with_llm(
    cfg: &AppConfig,
    workspace: &Path,
    llm: Arc<dyn LlmClient>,
) -> Result<AgentComponents, AgentError> {
    let sandbox = Sandbox::new(workspace).map_err(|e| AgentError::WorkingDirectory {
        path: workspace.display().to_string(),
        reason: e.to_string(),
    })?;
    let executor = ToolExecutor::new(builtin_registry(&cfg.tools), sandbox);
    tracing::info!(
        root = %executor.sandbox().root().display(),
        tools = executor.descriptors().len(),
        "sandbox ready"
    );

    let system_prompt = load_system_prompt(cfg.app.system_prompt_path.as_deref());
    Ok(AgentComponents {
        planner: Planner::new(llm, system_prompt),
        executor,
        loop_config: LoopConfig::from_app(&cfg.app),
    })
}

pub fn create_agent_components(
    cfg: &AppConfig,
    workspace: &Path,
) -> Result<AgentComponents, AgentError> {
    let llm = create_llm_from_config(cfg)?;
    create_agent_components_with_llm(cfg, workspace, llm)
}
