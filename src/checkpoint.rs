//! 检查点协作方接口
//!
//! 检查点由外部后端（如 git worktree 快照）管理；任务循环只在任务开始时创建一个，
//! 并把 id 与快照挂在任务的 user 消息上。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 检查点名称中保留的任务描述最大字符数
pub const CHECKPOINT_NAME_MAX_CHARS: usize = 50;

/// 检查点详情（由后端填充）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

/// 消息上的检查点引用；snapshot 可能因获取失败而缺省
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CheckpointSnapshot>,
}

#[async_trait]
pub trait CheckpointManager: Send + Sync {
    async fn create_checkpoint(&self, name: &str) -> anyhow::Result<String>;

    async fn get_checkpoint_details(&self, id: &str) -> anyhow::Result<CheckpointSnapshot>;

    async fn apply_checkpoint(&self, id: &str) -> anyhow::Result<()>;
}

/// 由任务描述生成检查点名：超过 50 个字符时截断并追加 "..."
pub fn checkpoint_name(description: &str) -> String {
    let description = description.trim();
    if description.chars().count() > CHECKPOINT_NAME_MAX_CHARS {
        let head: String = description.chars().take(CHECKPOINT_NAME_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        description.to_string()
    }
}

/// 创建检查点并尽量取回详情；详情获取失败不影响任务，只记日志
pub async fn create_for_task(
    manager: &dyn CheckpointManager,
    description: &str,
) -> Result<CheckpointRef, AgentError> {
    let name = checkpoint_name(description);
    let id = manager
        .create_checkpoint(&name)
        .await
        .map_err(|source| AgentError::CheckpointCreate {
            name: name.clone(),
            source,
        })?;
    let snapshot = match manager.get_checkpoint_details(&id).await {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(checkpoint = %id, "checkpoint details unavailable: {}", e);
            None
        }
    };
    tracing::info!(checkpoint = %id, name = %name, "checkpoint created");
    Ok(CheckpointRef { id, snapshot })
}

/// 应用检查点；失败时包装检查点 id 后返回
pub async fn apply(manager: &dyn CheckpointManager, id: &str) -> Result<(), AgentError> {
    manager
        .apply_checkpoint(id)
        .await
        .map_err(|source| AgentError::Checkpoint {
            id: id.to_string(),
            source,
        })
}
