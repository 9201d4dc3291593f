//! 模型流适配器
//!
//! 把 provider 的 ProviderChunk 流转为公开的 TaskEvent（文本增量、工具开始、工具参数增量），
//! 同时在 AssistantTurnBuilder 中聚合内容块；流结束后 finish() 给出最终助手消息、停止原因与用量。
//! 每次读取都与任务信号竞争，provider 永不返回时也能在信号触发后立即退出。

use std::collections::VecDeque;

use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, TaskEvent, TokenUsage};
use crate::llm::{ModelProvider, ModelRequest, ProviderChunk, ProviderStream, StopReason};
use crate::memory::{ContentBlock, Message};

/// 流结束后的最终助手回复
#[derive(Clone, Debug)]
pub struct AssistantResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: Option<TokenUsage>,
}

/// 流式累积中的工具调用
#[derive(Debug, Clone)]
struct ToolUseBuilder {
    index: usize,
    id: String,
    name: String,
    input_json: String,
}

impl ToolUseBuilder {
    /// 参数 JSON 解析失败时保留原文，工具侧会得到失败结果而不是整个任务失败
    fn finalize(self) -> ContentBlock {
        let input = if self.input_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.input_json).unwrap_or_else(|e| {
                tracing::warn!(tool = %self.name, "malformed tool input json: {}", e);
                serde_json::json!({ "_raw": self.input_json })
            })
        };
        ContentBlock::ToolUse {
            id: self.id,
            name: self.name,
            input,
        }
    }
}

#[derive(Debug)]
enum PendingBlock {
    Text(String),
    Tool(ToolUseBuilder),
}

/// 按到达顺序累积文本与工具调用
#[derive(Debug, Default)]
struct AssistantTurnBuilder {
    blocks: Vec<PendingBlock>,
}

impl AssistantTurnBuilder {
    fn push_text(&mut self, text: &str) {
        if let Some(PendingBlock::Text(t)) = self.blocks.last_mut() {
            t.push_str(text);
        } else {
            self.blocks.push(PendingBlock::Text(text.to_string()));
        }
    }

    fn find_tool_use_mut(&mut self, index: usize) -> Option<&mut ToolUseBuilder> {
        self.blocks.iter_mut().find_map(|b| match b {
            PendingBlock::Tool(t) if t.index == index => Some(t),
            _ => None,
        })
    }

    fn has_tool_uses(&self) -> bool {
        self.blocks.iter().any(|b| matches!(b, PendingBlock::Tool(_)))
    }

    fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
            .into_iter()
            .filter_map(|b| match b {
                PendingBlock::Text(t) if t.is_empty() => None,
                PendingBlock::Text(t) => Some(ContentBlock::Text { text: t }),
                PendingBlock::Tool(t) => Some(t.finalize()),
            })
            .collect()
    }
}

/// 一次模型调用的流
pub struct ModelStream {
    inner: ProviderStream,
    signal: CancellationToken,
    turn: AssistantTurnBuilder,
    stop_reason: Option<StopReason>,
    usage: Option<TokenUsage>,
    pending: VecDeque<TaskEvent>,
    done: bool,
}

impl ModelStream {
    /// 发起调用；在 provider 建立流之前信号触发则返回 Cancelled
    pub async fn start(
        provider: &dyn ModelProvider,
        request: ModelRequest,
        signal: CancellationToken,
    ) -> Result<Self, AgentError> {
        let inner = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(AgentError::Cancelled),
            stream = provider.stream(request, signal.clone()) => stream?,
        };
        Ok(Self {
            inner,
            signal,
            turn: AssistantTurnBuilder::default(),
            stop_reason: None,
            usage: None,
            pending: VecDeque::new(),
            done: false,
        })
    }

    /// 下一个对外事件；流结束返回 None
    pub async fn next_event(&mut self) -> Result<Option<TaskEvent>, AgentError> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Ok(Some(ev));
            }
            if self.done {
                return Ok(None);
            }
            let chunk = tokio::select! {
                biased;
                _ = self.signal.cancelled() => return Err(AgentError::Cancelled),
                chunk = self.inner.next() => chunk,
            };
            match chunk {
                Some(Ok(chunk)) => self.apply(chunk),
                Some(Err(e)) => return Err(e),
                None => self.done = true,
            }
        }
    }

    fn apply(&mut self, chunk: ProviderChunk) {
        match chunk {
            ProviderChunk::TextDelta { text } if !text.is_empty() => {
                self.turn.push_text(&text);
                self.pending.push_back(TaskEvent::PartialText { text });
            }
            ProviderChunk::TextDelta { .. } => {}
            ProviderChunk::ToolUseStart { index, id, name } => {
                self.pending.push_back(TaskEvent::ToolInvocationStarted {
                    id: id.clone(),
                    name: name.clone(),
                });
                self.turn.blocks.push(PendingBlock::Tool(ToolUseBuilder {
                    index,
                    id,
                    name,
                    input_json: String::new(),
                }));
            }
            ProviderChunk::ToolInputDelta {
                index,
                partial_json,
            } => match self.turn.find_tool_use_mut(index) {
                Some(tu) => {
                    tu.input_json.push_str(&partial_json);
                    let ev = TaskEvent::ToolInvocationPartialInput {
                        id: tu.id.clone(),
                        name: tu.name.clone(),
                        partial_json,
                    };
                    self.pending.push_back(ev);
                }
                None => tracing::warn!(index, "input delta for unknown tool block"),
            },
            ProviderChunk::ContentBlockStop { .. } => {}
            ProviderChunk::MessageDelta { stop_reason, usage } => {
                if let Some(reason) = stop_reason {
                    self.stop_reason = Some(reason);
                }
                // 同一次调用可能分多次上报（如 message_start 给输入、message_delta 给输出），逐项相加
                if let Some(u) = usage {
                    crate::core::accumulate(&mut self.usage, &u);
                }
            }
        }
    }

    /// 聚合最终消息；未上报停止原因时按是否有工具调用推断
    pub fn finish(self) -> AssistantResponse {
        let stop_reason = self.stop_reason.unwrap_or_else(|| {
            if self.turn.has_tool_uses() {
                StopReason::ToolUse
            } else {
                StopReason::EndTurn
            }
        });
        AssistantResponse {
            message: Message::assistant(self.turn.into_blocks()),
            stop_reason,
            usage: self.usage,
        }
    }
}
