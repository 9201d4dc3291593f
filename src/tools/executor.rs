//! 工具执行器
//!
//! 持有 ToolRegistry 与单次调用超时；execute 在超时内调用工具，同时与任务信号竞争：
//! 信号触发时停止等待并返回 Cancelled（不强杀已开始的外部操作）。
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::ToolDefinition;
use crate::tools::{ToolContext, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行指定工具；未注册返回 ToolNotFound，超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::ToolNotFound(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = tokio::select! {
            biased;
            _ = ctx.signal.cancelled() => None,
            r = timeout(self.timeout, tool.execute(args, ctx)) => Some(r),
        };

        let (ok, outcome): (bool, &str) = match &result {
            Some(Ok(Ok(_))) => (true, "ok"),
            Some(Ok(Err(_))) => (false, "error"),
            Some(Err(_)) => (false, "timeout"),
            None => (false, "cancelled"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "tool_use_id": ctx.tool_use_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Some(Ok(Ok(content))) => Ok(content),
            Some(Ok(Err(e))) => Err(AgentError::ToolExecutionFailed(e)),
            Some(Err(_)) => Err(AgentError::ToolTimeout(tool_name.to_string())),
            None => Err(AgentError::Cancelled),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Sleeps for a long time"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("finally".to_string())
        }
    }

    fn ctx(signal: CancellationToken) -> ToolContext {
        ToolContext {
            working_dir: std::env::temp_dir(),
            signal,
            tool_use_id: "tu_1".to_string(),
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        registry.register(crate::tools::EchoTool);
        ToolExecutor::new(registry, 30)
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = executor()
            .execute("nope", json!({}), &ctx(CancellationToken::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let exec = executor().with_timeout(Duration::from_millis(20));
        let err = exec
            .execute("slow", json!({}), &ctx(CancellationToken::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(_)));
    }

    #[tokio::test]
    async fn test_signal_stops_waiting() {
        let signal = CancellationToken::new();
        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let err = executor()
            .execute("slow", json!({}), &ctx(signal))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_echo_ok() {
        let out = executor()
            .execute("echo", json!({"text": "hi"}), &ctx(CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }
}
