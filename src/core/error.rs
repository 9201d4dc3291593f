//! Agent 错误类型
//!
//! 任务循环只在两处做本地恢复：工具失败（折叠为失败的 tool_result）与取消（转为 cancelled 事件）；
//! 其余错误终止任务并通过事件总线的错误通道交给调用方。

use thiserror::Error;

/// 任务执行过程中可能出现的错误（并发、取消、检查点、模型、工具等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 同一 Agent 上已有任务在运行（ConcurrencyError）
    #[error("A task is already running on this agent")]
    TaskAlreadyRunning,

    #[error("No task is running")]
    NoTaskRunning,

    /// 组合信号已触发；循环把它当作控制流，不当作失败
    #[error("Task cancelled")]
    Cancelled,

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// 应用检查点失败，携带检查点 id 与原始错误
    #[error("Checkpoint {id} failed: {source}")]
    Checkpoint {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Checkpoint creation '{name}' failed: {source}")]
    CheckpointCreate {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Attachment caching failed: {0}")]
    Attachment(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 模型流在聚合阶段出错（如流提前结束、事件顺序错乱）
    #[error("Model stream error: {0}")]
    Stream(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_error_carries_id_and_cause() {
        let err = AgentError::Checkpoint {
            id: "cp-42".to_string(),
            source: anyhow::anyhow!("dirty worktree"),
        };
        let text = err.to_string();
        assert!(text.contains("cp-42"));
        assert!(text.contains("dirty worktree"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(AgentError::Cancelled.is_cancelled());
        assert!(!AgentError::TaskAlreadyRunning.is_cancelled());
    }
}
