pub mod echo;
pub mod executor;
pub mod filesystem;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use filesystem::{ListDirTool, ReadFileTool, SafeFs};
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use schema::input_schema;

/// 内置演示工具：echo、list_dir、read_file
pub fn builtin_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    tools.register(ListDirTool);
    tools.register(ReadFileTool);
    tools
}
