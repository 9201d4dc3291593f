//! 对话历史：消息模型与带事件发布的写入器

pub mod conversation;
pub mod history;

pub use conversation::{ContentBlock, Message, Role, ToolUse};
pub use history::{HistoryWriter, SharedHistory};
