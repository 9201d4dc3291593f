//! LLM 层：模型提供方抽象、流适配器与 Mock 实现

pub mod mock;
pub mod stream;
pub mod traits;

pub use mock::{EchoProvider, ScriptedProvider, ScriptedTurn};
pub use stream::{AssistantResponse, ModelStream};
pub use traits::{
    ModelProvider, ModelRequest, ProviderChunk, ProviderStream, StopReason, ToolDefinition,
};
