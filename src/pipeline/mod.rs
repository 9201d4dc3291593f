//! 拦截器流水线：每轮推理之后，按配置顺序询问各拦截器是否继续
//!
//! 聚合规则：所有拦截器都投 Complete 才结束任务，任意一个 Continue 就再跑一轮。
//! 拦截器可以通过 HistoryWriter 追加消息（同时发布事件），也可以做异步工作（如执行工具）。

pub mod max_tokens;
pub mod tool_execution;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{AgentError, TaskEventBus, TaskSignal};
use crate::llm::{AssistantResponse, StopReason};
use crate::memory::HistoryWriter;
use crate::tools::ToolExecutor;

pub use max_tokens::MaxTokensInterceptor;
pub use tool_execution::ToolExecutionInterceptor;

/// 单个拦截器或整条流水线的决定
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopDecision {
    Continue,
    Complete,
}

impl LoopDecision {
    /// 合并两个决定：只有都为 Complete 才是 Complete
    pub fn and(self, other: LoopDecision) -> LoopDecision {
        match (self, other) {
            (LoopDecision::Complete, LoopDecision::Complete) => LoopDecision::Complete,
            _ => LoopDecision::Continue,
        }
    }
}

/// 一轮迭代的拦截器上下文
pub struct InterceptorContext<'a> {
    pub history: &'a HistoryWriter,
    /// 本轮最终助手回复（已追加到历史）
    pub last_response: &'a AssistantResponse,
    pub tools: &'a ToolExecutor,
    pub working_dir: &'a Path,
    pub stop_reason: &'a StopReason,
    pub signal: &'a TaskSignal,
    pub bus: &'a TaskEventBus,
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    async fn intercept(&self, ctx: &InterceptorContext<'_>) -> Result<LoopDecision, AgentError>;
}

/// 有序拦截器链
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    /// 内置链：先执行工具，再检查 max_tokens 截断
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Arc::new(ToolExecutionInterceptor),
            Arc::new(MaxTokensInterceptor),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// 依次执行全部拦截器并聚合；空链视为 Complete
    pub async fn execute(&self, ctx: &InterceptorContext<'_>) -> Result<LoopDecision, AgentError> {
        let mut decision = LoopDecision::Complete;
        for interceptor in &self.interceptors {
            let vote = interceptor.intercept(ctx).await?;
            tracing::debug!(interceptor = interceptor.name(), ?vote, "interceptor decision");
            decision = decision.and(vote);
        }
        Ok(decision)
    }
}
