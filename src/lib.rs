//! Hive - Rust 智能体任务执行核心
//!
//! 模块划分：
//! - **agent**: Agent 句柄（单任务并发保护、run_task / wait、历史只读视图）
//! - **task**: 任务输入与执行循环（模型流 -> 事件总线 -> 拦截器流水线）
//! - **pipeline**: 拦截器流水线与内置拦截器（工具执行、max_tokens 续写）
//! - **core**: 错误、任务事件、事件总线、取消/超时信号组合
//! - **llm**: 模型提供方抽象、流适配器与 Mock
//! - **memory**: 对话消息与历史写入口
//! - **tools**: 工具注册表、执行器与内置工具（echo、list_dir、read_file）
//! - **checkpoint** / **attachments**: 检查点与附件缓存协作方接口
//! - **config** / **prompt** / **observability**: 配置、系统提示词、日志初始化

pub mod agent;
pub mod attachments;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod task;
pub mod tools;

pub use agent::Agent;
pub use crate::config::{load_config, AgentConfig, AppConfig};
pub use crate::core::{AgentError, CancelReason, TaskEvent, TaskStream, TokenUsage};
pub use pipeline::{Interceptor, InterceptorPipeline, LoopDecision};
pub use task::RunOptions;
