//! Agent：一次只跑一个任务的执行体
//!
//! run_task 同步返回事件流，任务本身在 tokio 后台任务中运行并向流发布事件。
//! 「是否有任务在跑」是 Agent 上的显式状态：AtomicBool 做原子的检查并置位，
//! watch 通道作为完成句柄供 wait 使用。运行标记由 RunningGuard 恰好释放一次，
//! 且在终止事件发布之前释放，调用方看到终止事件时 is_task_running 已为 false。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::attachments::{Attachment, AttachmentCache};
use crate::checkpoint::{self, CheckpointManager, CheckpointRef};
use crate::config::AgentConfig;
use crate::core::{lock, AgentError, CancelReason, TaskEvent, TaskEventBus, TaskSignal, TaskStream};
use crate::llm::ModelProvider;
use crate::memory::{HistoryWriter, Message, Role, SharedHistory};
use crate::pipeline::InterceptorPipeline;
use crate::prompt::SystemPromptLoader;
use crate::task::{RunOptions, TaskInput, TaskRuntime};
use crate::tools::ToolExecutor;

/// 运行状态：运行标记与当前任务的完成句柄
#[derive(Default)]
struct TaskState {
    running: AtomicBool,
    completion: Mutex<Option<watch::Receiver<bool>>>,
}

/// Agent 句柄；Clone 共享同一份历史与运行状态
#[derive(Clone)]
pub struct Agent {
    runtime: TaskRuntime,
    history: SharedHistory,
    state: Arc<TaskState>,
}

impl Agent {
    pub fn new(provider: Arc<dyn ModelProvider>, executor: ToolExecutor, config: AgentConfig) -> Self {
        Self {
            runtime: TaskRuntime {
                provider,
                executor: Arc::new(executor),
                pipeline: InterceptorPipeline::with_defaults(),
                checkpoints: None,
                attachment_cache: None,
                prompt: Arc::new(SystemPromptLoader::default()),
                config: Arc::new(config),
            },
            history: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(TaskState::default()),
        }
    }

    pub fn with_checkpoints(mut self, manager: Arc<dyn CheckpointManager>) -> Self {
        self.runtime.checkpoints = Some(manager);
        self
    }

    pub fn with_attachment_cache(mut self, cache: Arc<dyn AttachmentCache>) -> Self {
        self.runtime.attachment_cache = Some(cache);
        self
    }

    /// 替换拦截器链（默认：工具执行 + max_tokens 续写）
    pub fn with_pipeline(mut self, pipeline: InterceptorPipeline) -> Self {
        self.runtime.pipeline = pipeline;
        self
    }

    pub fn with_prompt_loader(mut self, loader: SystemPromptLoader) -> Self {
        self.runtime.prompt = Arc::new(loader);
        self
    }

    /// 启动任务并返回其事件流
    ///
    /// 已有任务在运行时立即返回 TaskAlreadyRunning，不触碰历史。须在 tokio 运行时内调用。
    pub fn run_task(
        &self,
        description: impl Into<String>,
        model: impl Into<String>,
        attachments: Vec<Attachment>,
        options: RunOptions,
    ) -> Result<TaskStream, AgentError> {
        let description = description.into();
        let model = model.into();
        if description.trim().is_empty() {
            return Err(AgentError::InvalidTask("description is empty".into()));
        }
        if model.trim().is_empty() {
            return Err(AgentError::InvalidTask("model is empty".into()));
        }
        let max_iterations = options
            .max_iterations
            .unwrap_or(self.runtime.config.max_iterations);
        if max_iterations == 0 {
            return Err(AgentError::InvalidTask("max_iterations must be at least 1".into()));
        }

        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AgentError::TaskAlreadyRunning);
        }

        let bus = TaskEventBus::new();
        let stream = bus.subscribe();
        let (done_tx, done_rx) = watch::channel(false);
        *lock(&self.state.completion) = Some(done_rx);
        let guard = RunningGuard {
            state: self.state.clone(),
            done: Some(done_tx),
            bus: bus.clone(),
        };

        let input = TaskInput {
            description,
            model,
            attachments,
            max_iterations,
        };
        let runtime = self.runtime.clone();
        let history = HistoryWriter::new(self.history.clone(), bus.clone());
        let caller = options.signal;
        tokio::spawn(async move {
            let (signal, timer) = TaskSignal::compose(caller, runtime.config.task_timeout);
            let outcome = runtime.run(input, &history, &signal, &bus).await;
            drop(timer);
            guard.finish(terminal_event(outcome, &signal));
        });

        Ok(stream)
    }

    /// 等待当前任务结束；没有任务时返回 NoTaskRunning，signal 触发时放弃等待并返回 Cancelled
    pub async fn wait(&self, signal: Option<CancellationToken>) -> Result<(), AgentError> {
        let mut done = match lock(&self.state.completion).as_ref() {
            Some(rx) if self.is_task_running() => rx.clone(),
            _ => return Err(AgentError::NoTaskRunning),
        };
        let signal = signal.unwrap_or_default();
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(AgentError::Cancelled),
            // 发送端被丢弃同样意味着任务已结束
            _ = done.wait_for(|finished| *finished) => Ok(()),
        }
    }

    pub fn is_task_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// 历史快照
    pub async fn messages(&self) -> Vec<Message> {
        self.history.read().await.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.runtime.config
    }

    /// 回滚到指定检查点；任务运行中拒绝执行
    pub async fn apply_checkpoint(&self, id: &str) -> Result<(), AgentError> {
        if self.is_task_running() {
            return Err(AgentError::TaskAlreadyRunning);
        }
        let Some(manager) = &self.runtime.checkpoints else {
            return Err(AgentError::Checkpoint {
                id: id.to_string(),
                source: anyhow::anyhow!("no checkpoint manager configured"),
            });
        };
        checkpoint::apply(manager.as_ref(), id).await?;
        tracing::info!(checkpoint = %id, "checkpoint applied");
        Ok(())
    }

    /// 各任务起始用户消息上的检查点，按时间顺序
    pub async fn task_checkpoints(&self) -> Vec<CheckpointRef> {
        self.history
            .read()
            .await
            .iter()
            .filter(|m| m.role == Role::User)
            .filter_map(|m| m.checkpoint.clone())
            .collect()
    }
}

/// 把循环结果映射为终止条目：取消（任何路径）-> Cancelled，其余错误 -> 总线错误
fn terminal_event(
    outcome: Result<Option<crate::core::TokenUsage>, AgentError>,
    signal: &TaskSignal,
) -> Result<TaskEvent, AgentError> {
    match outcome {
        Ok(usage) => Ok(TaskEvent::Completed { usage }),
        Err(e) if e.is_cancelled() || signal.is_cancelled() => {
            let reason = signal.reason().unwrap_or(CancelReason::User);
            tracing::info!(?reason, "task cancelled");
            Ok(TaskEvent::Cancelled { reason })
        }
        Err(e) => Err(e),
    }
}

/// 运行标记的作用域守卫
///
/// finish 按「释放标记 -> 发布终止条目」的顺序收尾；若后台任务未走到 finish（panic），
/// drop 时仍释放标记并以错误终止总线，调用方总能收到终止条目。
struct RunningGuard {
    state: Arc<TaskState>,
    done: Option<watch::Sender<bool>>,
    bus: TaskEventBus,
}

impl RunningGuard {
    /// 释放运行标记；只有第一次调用返回 true
    fn release(&mut self) -> bool {
        match self.done.take() {
            Some(done) => {
                self.state.running.store(false, Ordering::Release);
                let _ = done.send(true);
                true
            }
            None => false,
        }
    }

    fn finish(mut self, terminal: Result<TaskEvent, AgentError>) {
        self.release();
        match terminal {
            Ok(event) => {
                self.bus.emit(event);
                self.bus.complete();
            }
            Err(e) => self.bus.fail(e),
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.release() {
            self.bus
                .fail(AgentError::Stream("task loop exited without a terminal event".into()));
        }
    }
}
