//! 任务执行循环
//!
//! 检查点 -> 用户消息 -> 附件缓存 -> 加载系统提示词 -> 每轮：模型流（事件直通总线）-> 用量 -> 助手消息 -> 拦截器流水线。
//! 流水线聚合为 Complete 或达到迭代上限时结束。信号在每轮开始和流结束后各检查一次；
//! 取消以 AgentError::Cancelled 返回，由 Agent 转成 cancelled 事件。

use std::future::Future;
use std::sync::Arc;

use crate::attachments::{AttachmentCache, AttachmentMap};
use crate::checkpoint::{self, CheckpointManager};
use crate::config::AgentConfig;
use crate::core::{accumulate, AgentError, TaskEvent, TaskEventBus, TaskSignal, TokenUsage};
use crate::llm::{ModelProvider, ModelRequest, ModelStream};
use crate::memory::{HistoryWriter, Message};
use crate::pipeline::{InterceptorContext, InterceptorPipeline, LoopDecision};
use crate::prompt::SystemPromptLoader;
use crate::task::TaskInput;
use crate::tools::ToolExecutor;

/// 任务运行所需的协作方；由 Agent 持有，每个任务克隆一份进入后台任务
#[derive(Clone)]
pub struct TaskRuntime {
    pub provider: Arc<dyn ModelProvider>,
    pub executor: Arc<ToolExecutor>,
    pub pipeline: InterceptorPipeline,
    pub checkpoints: Option<Arc<dyn CheckpointManager>>,
    pub attachment_cache: Option<Arc<dyn AttachmentCache>>,
    pub prompt: Arc<SystemPromptLoader>,
    pub config: Arc<AgentConfig>,
}

impl TaskRuntime {
    /// 跑完一个任务；返回最终累计用量（从未上报时为 None）
    pub async fn run(
        &self,
        input: TaskInput,
        history: &HistoryWriter,
        signal: &TaskSignal,
        bus: &TaskEventBus,
    ) -> Result<Option<TokenUsage>, AgentError> {
        tracing::info!(
            model = %input.model,
            max_iterations = input.max_iterations,
            "task started"
        );

        // 检查点先于用户消息创建，撤销到它即回到本任务之前
        let checkpoint = match &self.checkpoints {
            Some(manager) => Some(
                until_cancelled(
                    signal,
                    checkpoint::create_for_task(manager.as_ref(), &input.description),
                )
                .await??,
            ),
            None => None,
        };
        let mut user_message = Message::user_text(input.description.clone());
        if let Some(cp) = checkpoint {
            user_message = user_message.with_checkpoint(cp);
        }
        history.push(user_message).await;

        let attachments = self.cache_attachments(&input, signal).await?;
        let system = self.prompt.load(&self.config.working_dir);
        let tools = self.executor.definitions();

        let mut cumulative: Option<TokenUsage> = None;
        let mut iterations = 0;
        while iterations < input.max_iterations {
            if signal.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            tracing::debug!(iteration = iterations + 1, "inference");

            let request = ModelRequest {
                model: input.model.clone(),
                max_tokens: self.config.max_tokens,
                system: system.clone(),
                messages: history.snapshot().await,
                tools: tools.clone(),
                user_id: self.config.user_id.clone(),
                attachments: attachments.clone(),
            };
            let mut stream = ModelStream::start(self.provider.as_ref(), request, signal.token()).await?;
            while let Some(event) = stream.next_event().await? {
                bus.emit(event);
            }
            if signal.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let response = stream.finish();
            if let Some(usage) = response.usage {
                let total = accumulate(&mut cumulative, &usage);
                bus.emit(TaskEvent::Usage {
                    usage,
                    cumulative: total,
                });
            }
            history.push(response.message.clone()).await;

            let ctx = InterceptorContext {
                history,
                last_response: &response,
                tools: &self.executor,
                working_dir: &self.config.working_dir,
                stop_reason: &response.stop_reason,
                signal,
                bus,
            };
            let decision = self.pipeline.execute(&ctx).await?;
            iterations += 1;
            if decision == LoopDecision::Complete {
                tracing::info!(iterations, "task completed");
                return Ok(cumulative);
            }
        }

        if signal.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        tracing::info!(iterations, "iteration limit reached");
        Ok(cumulative)
    }

    async fn cache_attachments(
        &self,
        input: &TaskInput,
        signal: &TaskSignal,
    ) -> Result<AttachmentMap, AgentError> {
        if input.attachments.is_empty() {
            return Ok(AttachmentMap::new());
        }
        let Some(cache) = &self.attachment_cache else {
            tracing::warn!(
                count = input.attachments.len(),
                "attachments ignored: no attachment cache configured"
            );
            return Ok(AttachmentMap::new());
        };
        let cached = until_cancelled(signal, cache.cache(&input.attachments))
            .await?
            .map_err(|e| AgentError::Attachment(e.to_string()))?;
        tracing::debug!(count = cached.len(), "attachments cached");
        Ok(cached)
    }
}

/// 等待 fut，信号先触发则返回 Cancelled
async fn until_cancelled<F: Future>(signal: &TaskSignal, fut: F) -> Result<F::Output, AgentError> {
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(AgentError::Cancelled),
        out = fut => Ok(out),
    }
}
