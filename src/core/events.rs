//! 任务事件：任务循环发布到事件总线的有序通知
//!
//! 每个事件都是已经作用到对话历史上的变更（或流式增量）的投影；
//! Completed / Cancelled 是终止事件，一个任务恰好发出其中之一（或总线错误）。

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::memory::Message;

/// Token 使用统计（单次调用或任务内累计）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_creation_input_tokens
            + self.cache_read_input_tokens
    }
}

/// 逐项相加
impl AddAssign<&TokenUsage> for TokenUsage {
    fn add_assign(&mut self, rhs: &TokenUsage) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_creation_input_tokens += rhs.cache_creation_input_tokens;
        self.cache_read_input_tokens += rhs.cache_read_input_tokens;
    }
}

/// 累加到任务累计值；首次上报前累计值为 None
pub fn accumulate(cumulative: &mut Option<TokenUsage>, usage: &TokenUsage) -> TokenUsage {
    let total = cumulative.get_or_insert_with(TokenUsage::default);
    *total += usage;
    *total
}

/// 取消原因：调用方信号先触发为 User，内部超时先触发为 Timeout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    User,
    Timeout,
}

/// 任务事件（可序列化为 JSON，供 NDJSON / 协议适配层转发）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 历史中追加了一条消息；index 为其在历史中的位置
    MessageAppended { index: usize, message: Message },
    /// 助手文本增量
    PartialText { text: String },
    /// 模型开始请求某个工具
    ToolInvocationStarted { id: String, name: String },
    /// 工具参数 JSON 的增量片段
    ToolInvocationPartialInput {
        id: String,
        name: String,
        partial_json: String,
    },
    ToolInvocationResult {
        id: String,
        name: String,
        output: String,
    },
    ToolInvocationError {
        id: String,
        name: String,
        error: String,
    },
    /// 本次调用用量 + 任务累计用量
    Usage {
        usage: TokenUsage,
        cumulative: TokenUsage,
    },
    Completed { usage: Option<TokenUsage> },
    Cancelled { reason: CancelReason },
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Completed { .. } | TaskEvent::Cancelled { .. })
    }
}
