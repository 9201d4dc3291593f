//! 任务：单次 run_task 的输入与执行循环

pub mod loop_;

use tokio_util::sync::CancellationToken;

use crate::attachments::Attachment;

pub use loop_::TaskRuntime;

/// run_task 的可选参数
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// 覆盖配置中的迭代上限；必须 ≥ 1
    pub max_iterations: Option<usize>,
    /// 调用方取消信号
    pub signal: Option<CancellationToken>,
}

impl RunOptions {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// 已校验的任务输入
#[derive(Clone, Debug)]
pub struct TaskInput {
    pub description: String,
    pub model: String,
    pub attachments: Vec<Attachment>,
    pub max_iterations: usize,
}
