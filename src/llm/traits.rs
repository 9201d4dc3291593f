//! 模型提供方抽象
//!
//! 所有后端（Anthropic / OpenAI 风格的流式接口，或测试用脚本）实现 ModelProvider：
//! 接收完整请求与取消令牌，返回按顺序到达的 ProviderChunk 流。聚合由 ModelStreamAdapter 负责。

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::attachments::CachedAttachment;
use crate::core::{AgentError, TokenUsage};
use crate::memory::Message;

/// 提供给模型的工具定义
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// 一次模型调用的完整输入
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// 可选的用户身份（部分 provider 用于滥用监控）
    pub user_id: Option<String>,
    pub attachments: HashMap<String, CachedAttachment>,
}

/// 模型停止原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    /// 因 max_tokens 预算被截断
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn is_truncated(&self) -> bool {
        matches!(self, StopReason::MaxTokens)
    }
}

/// provider 原生的流式分片；index 为内容块序号
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderChunk {
    TextDelta { text: String },
    ToolUseStart { index: usize, id: String, name: String },
    ToolInputDelta { index: usize, partial_json: String },
    ContentBlockStop { index: usize },
    MessageDelta {
        stop_reason: Option<StopReason>,
        usage: Option<TokenUsage>,
    },
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderChunk, AgentError>> + Send>>;

/// 模型提供方：发起一次流式调用
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// 实现方应尽量响应 signal，及时中止自身的网络请求
    async fn stream(
        &self,
        request: ModelRequest,
        signal: CancellationToken,
    ) -> Result<ProviderStream, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_serde_and_truncation() {
        let parsed: StopReason = serde_json::from_str("\"max_tokens\"").unwrap();
        assert_eq!(parsed, StopReason::MaxTokens);
        assert_eq!(serde_json::to_string(&StopReason::ToolUse).unwrap(), "\"tool_use\"");
        assert!(StopReason::MaxTokens.is_truncated());
        assert!(!StopReason::EndTurn.is_truncated());
    }
}
