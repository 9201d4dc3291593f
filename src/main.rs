//! Hive 命令行入口
//!
//! `hive <任务描述...>`：加载配置、初始化日志，用内置工具与 Echo Mock 构建 Agent 并运行任务，
//! 每个事件以一行 JSON（NDJSON）写到 stdout。Ctrl+C 通过调用方信号取消任务。

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use hive::llm::EchoProvider;
use hive::tools::{builtin_registry, ToolExecutor};
use hive::{load_config, observability, Agent, AgentConfig, RunOptions};
use tokio_util::sync::CancellationToken;

const DEMO_MODEL: &str = "mock-echo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let description = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let description = if description.trim().is_empty() {
        "List the files in the working directory".to_string()
    } else {
        description
    };

    let cfg = load_config(None).context("Failed to load config")?;
    let executor = ToolExecutor::new(builtin_registry(), cfg.tools.tool_timeout_secs);
    let agent = Agent::new(Arc::new(EchoProvider), executor, AgentConfig::from(&cfg))
        .with_prompt_loader(hive::prompt::SystemPromptLoader::from_section(&cfg.prompt));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, cancelling task");
            on_ctrl_c.cancel();
        }
    });

    let mut stream = agent
        .run_task(description, DEMO_MODEL, vec![], RunOptions::default().with_signal(cancel))
        .context("Failed to start task")?;

    let stdout = std::io::stdout();
    while let Some(item) = stream.recv().await {
        match item {
            Ok(event) => {
                let line = serde_json::to_string(&event).context("Failed to encode event")?;
                let mut out = stdout.lock();
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
            Err(e) => anyhow::bail!("task failed: {}", e),
        }
    }
    Ok(())
}
