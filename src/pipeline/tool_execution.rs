//! 工具执行拦截器
//!
//! 扫描本轮助手回复中的 tool_use 块，逐个按名解析并执行；成功与失败都写成 tool_result，
//! 全部结果放进一条新的 user 消息追加到历史。执行过任何工具就投 Continue，否则 Complete。
//! 单个工具失败只影响它自己的结果块，不中止任务；取消则向上传播。
//! 取消时未完成的调用写成 is_error 的 cancelled 结果，已完成的结果保留，
//! 历史里每个 tool_use 都有对应的 tool_result。

use async_trait::async_trait;

use crate::core::{AgentError, TaskEvent};
use crate::memory::{ContentBlock, Message};
use crate::pipeline::{Interceptor, InterceptorContext, LoopDecision};
use crate::tools::ToolContext;

const CANCELLED_RESULT: &str = "Tool execution cancelled";

pub struct ToolExecutionInterceptor;

#[async_trait]
impl Interceptor for ToolExecutionInterceptor {
    fn name(&self) -> &str {
        "tool_execution"
    }

    async fn intercept(&self, ctx: &InterceptorContext<'_>) -> Result<LoopDecision, AgentError> {
        let tool_uses = ctx.last_response.message.tool_uses();
        if tool_uses.is_empty() {
            return Ok(LoopDecision::Complete);
        }

        let mut results = Vec::with_capacity(tool_uses.len());
        let mut cancelled = false;
        for tu in tool_uses {
            if cancelled || ctx.signal.is_cancelled() {
                cancelled = true;
                results.push(cancelled_result(tu.id));
                continue;
            }
            let tool_ctx = ToolContext {
                working_dir: ctx.working_dir.to_path_buf(),
                signal: ctx.signal.token(),
                tool_use_id: tu.id.clone(),
            };
            match ctx.tools.execute(&tu.name, tu.input, &tool_ctx).await {
                Ok(output) => {
                    ctx.bus.emit(TaskEvent::ToolInvocationResult {
                        id: tu.id.clone(),
                        name: tu.name.clone(),
                        output: output.clone(),
                    });
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: tu.id,
                        content: output,
                        is_error: false,
                    });
                }
                Err(AgentError::Cancelled) => {
                    tracing::info!(tool = %tu.name, "tool call cancelled");
                    cancelled = true;
                    results.push(cancelled_result(tu.id));
                }
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!(tool = %tu.name, "tool failed: {}", error);
                    ctx.bus.emit(TaskEvent::ToolInvocationError {
                        id: tu.id.clone(),
                        name: tu.name.clone(),
                        error: error.clone(),
                    });
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: tu.id,
                        content: error,
                        is_error: true,
                    });
                }
            }
        }

        ctx.history.push(Message::tool_results(results)).await;
        if cancelled {
            return Err(AgentError::Cancelled);
        }
        Ok(LoopDecision::Continue)
    }
}

fn cancelled_result(tool_use_id: String) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id,
        content: CANCELLED_RESULT.to_string(),
        is_error: true,
    }
}
