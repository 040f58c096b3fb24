//! Warden 命令行入口
//!
//! 解析参数、初始化日志与配置、装配 Agent，对单条 prompt 运行主循环并打印结果。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use warden::config::load_config;
use warden::create_agent_components;
use warden::react::{usage_summary, ReactEvent};

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Let an LLM act inside one sandboxed directory")]
struct Cli {
    /// 自然语言请求
    prompt: String,

    /// 打印每次调用的参数、工具结果与 token 统计
    #[arg(long)]
    verbose: bool,

    /// 覆盖 app.workspace_root
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// 额外的配置文件
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    warden::observability::init();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let workspace = cli
        .workdir
        .clone()
        .unwrap_or_else(|| cfg.app.workspace_root());
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create working directory {}", workspace.display()))?;

    let components =
        create_agent_components(&cfg, &workspace).context("Failed to create agent")?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(event_rx, cli.verbose));
    let result = components.run(&cli.prompt, Some(&event_tx)).await;
    drop(event_tx);
    printer.await.context("event printer failed")?;

    match result.termination.final_text() {
        Some(text) => println!("{text}"),
        None => {
            if let Some(diag) = result.termination.diagnostic() {
                eprintln!("{diag}");
            }
        }
    }

    if cli.verbose {
        println!("{}", usage_summary(&cli.prompt, &result.usage));
    }

    let code = u8::try_from(result.termination.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<ReactEvent>, verbose: bool) {
    while let Some(ev) = rx.recv().await {
        let Some(line) = ev.render(verbose) else {
            continue;
        };
        if ev.is_diagnostic() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}
