//! Mock 模型提供方（用于测试与本地演示，无需 API）
//!
//! - ScriptedProvider：按预设脚本逐次返回分片流，并记录收到的请求
//! - EchoProvider：取最后一条 user 消息回显为 echo 工具调用；拿到工具结果后以文本结束

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, TokenUsage};
use crate::llm::{ModelProvider, ModelRequest, ProviderChunk, ProviderStream, StopReason};
use crate::memory::{ContentBlock, Role};

/// 文本分片的字符数（模拟打字效果）
const CHUNK_CHARS: usize = 6;

fn text_chunks(text: &str) -> Vec<ProviderChunk> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .map(|c| ProviderChunk::TextDelta {
            text: c.iter().collect(),
        })
        .collect()
}

fn into_stream(chunks: Vec<ProviderChunk>) -> ProviderStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok::<_, AgentError>)))
}

/// 脚本中的一轮响应
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
    Chunks(Vec<ProviderChunk>),
    /// 流建立后永不产出
    Pending,
    /// stream() 直接返回错误
    Fail(String),
    /// 产出若干分片后以错误结束
    FailAfter(Vec<ProviderChunk>, String),
}

impl ScriptedTurn {
    pub fn chunks(chunks: Vec<ProviderChunk>) -> Self {
        ScriptedTurn::Chunks(chunks)
    }

    pub fn text(text: &str, usage: TokenUsage) -> Self {
        let mut chunks = text_chunks(text);
        chunks.push(ProviderChunk::MessageDelta {
            stop_reason: Some(StopReason::EndTurn),
            usage: Some(usage),
        });
        ScriptedTurn::Chunks(chunks)
    }

    /// 因 max_tokens 截断的文本
    pub fn truncated(text: &str, usage: TokenUsage) -> Self {
        let mut chunks = text_chunks(text);
        chunks.push(ProviderChunk::MessageDelta {
            stop_reason: Some(StopReason::MaxTokens),
            usage: Some(usage),
        });
        ScriptedTurn::Chunks(chunks)
    }

    pub fn tool_call(id: &str, name: &str, input: Value, usage: TokenUsage) -> Self {
        Self::tool_calls(vec![(id, name, input)], usage)
    }

    pub fn tool_calls(calls: Vec<(&str, &str, Value)>, usage: TokenUsage) -> Self {
        let mut chunks = Vec::new();
        for (index, (id, name, input)) in calls.into_iter().enumerate() {
            chunks.push(ProviderChunk::ToolUseStart {
                index,
                id: id.to_string(),
                name: name.to_string(),
            });
            chunks.push(ProviderChunk::ToolInputDelta {
                index,
                partial_json: input.to_string(),
            });
            chunks.push(ProviderChunk::ContentBlockStop { index });
        }
        chunks.push(ProviderChunk::MessageDelta {
            stop_reason: Some(StopReason::ToolUse),
            usage: Some(usage),
        });
        ScriptedTurn::Chunks(chunks)
    }
}

/// 脚本化 provider：每次调用取出下一轮；脚本用尽时返回 LlmError
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn stream(
        &self,
        request: ModelRequest,
        _signal: CancellationToken,
    ) -> Result<ProviderStream, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let turn = self
            .turns
            .lock()
            .ok()
            .and_then(|mut t| t.pop_front())
            .ok_or_else(|| AgentError::LlmError("mock script exhausted".to_string()))?;

        match turn {
            ScriptedTurn::Chunks(chunks) => Ok(into_stream(chunks)),
            ScriptedTurn::Pending => Ok(Box::pin(stream::pending::<Result<ProviderChunk, AgentError>>())),
            ScriptedTurn::Fail(msg) => Err(AgentError::LlmError(msg)),
            ScriptedTurn::FailAfter(chunks, msg) => {
                let items = chunks
                    .into_iter()
                    .map(Ok::<_, AgentError>)
                    .chain(std::iter::once(Err(AgentError::LlmError(msg))));
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}

/// Echo 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct EchoProvider;

#[async_trait]
impl ModelProvider for EchoProvider {
    async fn stream(
        &self,
        request: ModelRequest,
        _signal: CancellationToken,
    ) -> Result<ProviderStream, AgentError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User);

        let tool_output = last_user.and_then(|m| {
            m.content.iter().find_map(|b| match b {
                ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            })
        });

        let input_tokens = request
            .messages
            .iter()
            .map(|m| m.text().chars().count() as u64 / 4 + 1)
            .sum();

        let turn = match tool_output {
            Some(output) => {
                let reply = format!("Echo from Mock: {}", output);
                let usage = TokenUsage::new(input_tokens, reply.chars().count() as u64 / 4 + 1);
                ScriptedTurn::text(&reply, usage)
            }
            None => {
                let text = last_user
                    .map(|m| m.text())
                    .unwrap_or_else(|| "(no input)".to_string());
                let id = format!("toolu_{}", uuid::Uuid::new_v4().simple());
                ScriptedTurn::tool_call(&id, "echo", json!({ "text": text }), TokenUsage::new(input_tokens, 8))
            }
        };

        match turn {
            ScriptedTurn::Chunks(chunks) => Ok(into_stream(chunks)),
            _ => Err(AgentError::LlmError("echo provider produced no chunks".to_string())),
        }
    }
}
