//! 工具参数 JSON Schema 生成（schemars 由参数结构体自动生成）

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回参数类型 T 的 JSON Schema，作为 ToolDefinition.input_schema 下发给模型
pub fn input_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}
