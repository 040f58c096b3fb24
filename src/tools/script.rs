//! 脚本执行器
//!
//! 以 `<interpreter> <script> <args...>` 启动子进程：工作目录为沙箱根，stdin 置空，
//! 捕获 stdout/stderr，墙钟超时后由 kill_on_drop 杀掉子进程。
//! 超时与启动失败都作为工具错误返回，不会中断循环。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::config::ExecSection;
use crate::core::{ErrorKind, ToolError, ToolOutcome};
use crate::tools::registry::parse_args;
use crate::tools::schema::parameters_schema_for;
use crate::tools::{Sandbox, Tool, ToolContext};

/// stdout 为空时的固定回复
pub const NO_OUTPUT: &str = "No output produced";

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    extension: String,
    timeout: Duration,
}

impl ScriptRunner {
    /// `extension` 不带点，如 "py"
    pub fn new(interpreter: impl Into<String>, extension: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            timeout,
        }
    }

    pub fn from_config(cfg: &ExecSection) -> Self {
        Self::new(
            cfg.interpreter.clone(),
            cfg.script_extension.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub async fn run(&self, sandbox: &Sandbox, file_path: &str, args: &[String]) -> ToolOutcome {
        let full = sandbox.resolve(file_path, "execute")?;
        if !full.is_file() {
            return Err(ToolError::not_found(format!(
                "File \"{file_path}\" not found."
            )));
        }
        if full.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return Err(ToolError::new(
                ErrorKind::NotExecutableKind,
                format!("\"{}\" is not a .{} file.", file_path, self.extension),
            ));
        }

        tracing::info!(
            interpreter = %self.interpreter,
            script = %file_path,
            argc = args.len(),
            "run script"
        );

        let child = Command::new(&self.interpreter)
            .arg(&full)
            .args(args)
            .current_dir(sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::new(
                    ErrorKind::ExecutionFailure,
                    format!("executing \"{file_path}\": {e}"),
                )
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::new(
                    ErrorKind::ExecutionFailure,
                    format!("executing \"{file_path}\": {e}"),
                ))
            }
            Err(_) => {
                tracing::warn!(script = %file_path, timeout = ?self.timeout, "script timed out");
                return Err(ToolError::new(
                    ErrorKind::ExecutionTimeout,
                    format!(
                        "executing \"{}\": timed out after {:?}",
                        file_path, self.timeout
                    ),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(format_report(&stdout, &stderr, output.status.code()))
    }
}

/// 合并报告：stdout 非空时嵌入两路输出，非零退出码时追加说明；stdout 为空一律返回 NO_OUTPUT。
/// `code` 为 None 表示被信号终止。
pub fn format_report(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    if stdout.is_empty() {
        return NO_OUTPUT.to_string();
    }
    let mut report = format!("STDOUT: {stdout}, STDERR: {stderr}");
    match code {
        Some(0) => {}
        Some(c) => report.push_str(&format!(", Process exited with code {c}")),
        None => report.push_str(", Process terminated by signal"),
    }
    report
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunScriptArgs {
    /// Path of the script to execute, relative to the working directory.
    pub file_path: String,
    /// Optional command-line arguments passed to the script, in order.
    pub args: Option<Vec<String>>,
}

/// run_python_file：在沙箱内执行脚本
pub struct RunScriptTool {
    runner: ScriptRunner,
}

impl RunScriptTool {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn name(&self) -> &str {
        "run_python_file"
    }

    fn description(&self) -> &str {
        "Executes a Python file in the working directory with optional arguments and returns its captured output."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<RunScriptArgs>()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, args: Value) -> ToolOutcome {
        let args: RunScriptArgs = parse_args(self.name(), args)?;
        // 每次调用新建参数列表
        let script_args = args.args.unwrap_or_default();
        self.runner.run(ctx.sandbox, &args.file_path, &script_args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_formats() {
        assert_eq!(format_report("", "boom", Some(1)), NO_OUTPUT);
        assert_eq!(format_report("hi\n", "", Some(0)), "STDOUT: hi\n, STDERR: ");
        let failed = format_report("x", "err", Some(1));
        assert!(failed.contains("STDOUT: x"));
        assert!(failed.contains("STDERR: err"));
        assert!(failed.ends_with("Process exited with code 1"));
        assert!(format_report("x", "", None).contains("signal"));
    }

    #[test]
    fn test_extension_is_normalized() {
        let runner = ScriptRunner::new("python3", ".py", Duration::from_secs(30));
        assert_eq!(runner.extension(), "py");
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;

        fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, Sandbox) {
            let dir = tempfile::tempdir().unwrap();
            for (name, body) in files {
                std::fs::write(dir.path().join(name), body).unwrap();
            }
            let sb = Sandbox::new(dir.path()).unwrap();
            (dir, sb)
        }

        fn sh(timeout: Duration) -> ScriptRunner {
            ScriptRunner::new("sh", "sh", timeout)
        }

        #[tokio::test]
        async fn test_silent_success_yields_sentinel() {
            let (_dir, sb) = setup(&[("quiet.sh", "exit 0\n")]);
            let out = sh(Duration::from_secs(10)).run(&sb, "quiet.sh", &[]).await.unwrap();
            assert_eq!(out, NO_OUTPUT);
        }

        #[tokio::test]
        async fn test_stderr_only_failure_yields_sentinel() {
            let (_dir, sb) = setup(&[("noisy.sh", "echo oops >&2\nexit 3\n")]);
            let out = sh(Duration::from_secs(10)).run(&sb, "noisy.sh", &[]).await.unwrap();
            assert_eq!(out, NO_OUTPUT);
        }

        #[tokio::test]
        async fn test_output_and_nonzero_exit_code() {
            let (_dir, sb) = setup(&[("fail.sh", "printf x\nexit 1\n")]);
            let out = sh(Duration::from_secs(10)).run(&sb, "fail.sh", &[]).await.unwrap();
            assert!(out.contains("STDOUT: x"));
            assert!(out.contains("Process exited with code 1"));
        }

        #[tokio::test]
        async fn test_args_and_cwd() {
            let (dir, sb) = setup(&[("args.sh", "echo \"$1-$2\"\npwd\n")]);
            let args = vec!["3".to_string(), "5".to_string()];
            let out = sh(Duration::from_secs(10)).run(&sb, "args.sh", &args).await.unwrap();
            assert!(out.contains("3-5"));
            let root = dir.path().canonicalize().unwrap();
            assert!(out.contains(root.to_str().unwrap()));
        }

        #[tokio::test]
        async fn test_timeout_is_reported() {
            let (_dir, sb) = setup(&[("slow.sh", "sleep 5\necho late\n")]);
            let err = sh(Duration::from_millis(300))
                .run(&sb, "slow.sh", &[])
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::ExecutionTimeout);
        }

        #[tokio::test]
        async fn test_rejections() {
            let (_dir, sb) = setup(&[("notes.txt", "hi")]);
            let runner = sh(Duration::from_secs(10));
            let err = runner.run(&sb, "notes.txt", &[]).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::NotExecutableKind);
            let err = runner.run(&sb, "missing.sh", &[]).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::NotFound);
            let err = runner.run(&sb, "../x.sh", &[]).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::SandboxViolation);
        }

        #[tokio::test]
        async fn test_spawn_failure_is_execution_failure() {
            let (_dir, sb) = setup(&[("ok.sh", "echo hi\n")]);
            let runner = ScriptRunner::new("/nonexistent/interpreter", "sh", Duration::from_secs(5));
            let err = runner.run(&sb, "ok.sh", &[]).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::ExecutionFailure);
        }

        #[tokio::test]
        async fn test_tool_defaults_args_per_call() {
            let (_dir, sb) = setup(&[("count.sh", "echo $#\n")]);
            let tool = RunScriptTool::new(sh(Duration::from_secs(10)));
            let ctx = ToolContext { sandbox: &sb };
            let first = tool
                .execute(&ctx, serde_json::json!({ "file_path": "count.sh", "args": ["a", "b"] }))
                .await
                .unwrap();
            let second = tool
                .execute(&ctx, serde_json::json!({ "file_path": "count.sh" }))
                .await
                .unwrap();
            assert!(first.contains("STDOUT: 2"));
            assert!(second.contains("STDOUT: 0"));
        }
    }
}
