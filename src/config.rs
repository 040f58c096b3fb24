//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再叠加 `--config` 指定的文件，最后用环境变量 `WARDEN__*` 覆盖
//! （双下划线表示嵌套，如 `WARDEN__APP__MAX_ITERATIONS=5`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [app] 段：工作目录与循环上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// 沙箱根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 每次运行最多的 Planner 往返次数
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 连续 Planner 调用失败达到此值即终止
    #[serde(default = "default_max_consecutive_planner_failures")]
    pub max_consecutive_planner_failures: usize,
    /// Planner 调用失败后、下一轮之前的等待（毫秒）
    #[serde(default = "default_planner_retry_delay_ms")]
    pub planner_retry_delay_ms: u64,
    /// 自定义 system prompt 文件
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workspace_root: None,
            max_iterations: default_max_iterations(),
            max_consecutive_planner_failures: default_max_consecutive_planner_failures(),
            planner_retry_delay_ms: default_planner_retry_delay_ms(),
            system_prompt_path: None,
        }
    }
}

impl AppSection {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

fn default_max_iterations() -> usize {
    20
}

fn default_max_consecutive_planner_failures() -> usize {
    3
}

fn default_planner_retry_delay_ms() -> u64 {
    1000
}

/// [llm] 段：后端选择、凭据环境变量与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai（OpenAI 兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 启动时读取一次的凭据环境变量名
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），0 表示不设超时
    #[serde(default)]
    pub request: u64,
}

/// [tools] 段：读文件截断与脚本执行
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
    #[serde(default)]
    pub exec: ExecSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            max_file_chars: default_max_file_chars(),
            exec: ExecSection::default(),
        }
    }
}

fn default_max_file_chars() -> usize {
    crate::tools::filesystem::DEFAULT_MAX_FILE_CHARS
}

/// [tools.exec] 段：解释器、脚本后缀、墙钟超时
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_script_extension")]
    pub script_extension: String,
    #[serde(default = "default_exec_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_extension: default_script_extension(),
            timeout_secs: default_exec_timeout_secs(),
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_exec_timeout_secs() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 WARDEN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WARDEN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WARDEN")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.max_iterations, 20);
        assert_eq!(cfg.app.max_consecutive_planner_failures, 3);
        assert_eq!(cfg.app.workspace_root(), PathBuf::from("workspace"));
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.api_key_env, "GEMINI_API_KEY");
        assert_eq!(cfg.tools.max_file_chars, 10_000);
        assert_eq!(cfg.tools.exec.timeout_secs, 30);
        assert_eq!(cfg.tools.exec.script_extension, "py");
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(
            &path,
            "[app]\nmax_iterations = 5\n\n[tools.exec]\ninterpreter = \"sh\"\nscript_extension = \"sh\"\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.max_iterations, 5);
        assert_eq!(cfg.app.max_consecutive_planner_failures, 3);
        assert_eq!(cfg.tools.exec.interpreter, "sh");
        assert_eq!(cfg.tools.exec.timeout_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.toml"))).is_err());
    }
}
