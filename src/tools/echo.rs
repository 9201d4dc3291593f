//! echo：原样返回输入文本，供 Mock provider 与测试使用

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{input_schema, Tool, ToolContext};

#[derive(Deserialize, JsonSchema)]
struct EchoArgs {
    /// 要回显的文本
    text: String,
}

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged. Args: {\"text\": \"message\"}"
    }

    fn input_schema(&self) -> Value {
        input_schema::<EchoArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: EchoArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        tracing::debug!(tool_use_id = %ctx.tool_use_id, "echo");
        Ok(args.text)
    }
}
