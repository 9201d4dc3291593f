//! 沙箱文件系统工具
//!
//! SafeFs 绑定任务工作目录，所有路径经 resolve 校验必须在根下（禁止 ../ 逃逸）；
//! ReadFileTool / ListDirTool 每次调用按 ToolContext.working_dir 建立 SafeFs。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::{input_schema, Tool, ToolContext};

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    /// 检查路径是否在沙箱内；绝对路径也必须落在根下
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let path = path.trim_start_matches("./");
        let full = self.root_dir.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| AgentError::ToolExecutionFailed(format!("Path not found: {}", path)))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(AgentError::PathEscape(path.to_string())) // 如 ../../etc/passwd
        }
    }

    pub async fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    pub async fn list_dir(&self, path: &str) -> Result<Vec<String>, AgentError> {
        let base = if path.is_empty() || path == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut dir = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(format!("List failed: {}", e)))?;
        let mut entries = Vec::new();
        while let Some(e) = dir
            .next_entry()
            .await
            .map_err(|e| AgentError::ToolExecutionFailed(e.to_string()))?
        {
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let is_dir = e.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                entries.push(format!("{}{}", name, if is_dir { "/" } else { "" }));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[derive(Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// 相对于工作目录的文件路径
    path: String,
}

#[derive(Deserialize, JsonSchema)]
struct ListDirArgs {
    /// 相对于工作目录的目录路径，默认 "."
    #[serde(default)]
    path: Option<String>,
}

/// 读取文件内容
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents. Args: {\"path\": \"file path relative to the working directory\"}"
    }

    fn input_schema(&self) -> Value {
        input_schema::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: ReadFileArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        tracing::info!(path = %args.path, "read_file tool execute");
        SafeFs::new(&ctx.working_dir)
            .read_file(&args.path)
            .await
            .map_err(|e| e.to_string())
    }
}

/// 列出目录（隐藏文件除外，目录以 / 结尾）
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List directory. Args: {\"path\": \"directory path, default '.'\"}"
    }

    fn input_schema(&self) -> Value {
        input_schema::<ListDirArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, String> {
        let args: ListDirArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        let path = args.path.unwrap_or_else(|| ".".to_string());
        tracing::info!(path = %path, "list_dir tool execute");
        let entries = SafeFs::new(&ctx.working_dir)
            .list_dir(&path)
            .await
            .map_err(|e| e.to_string())?;
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext {
            working_dir: dir.to_path_buf(),
            signal: CancellationToken::new(),
            tool_use_id: "tu_1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_dir_marks_directories_and_hides_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let out = ListDirTool.execute(json!({}), &ctx(dir.path())).await.unwrap();
        assert_eq!(out, "a.txt\nsub/");
    }

    #[tokio::test]
    async fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# notes").unwrap();
        let out = ReadFileTool
            .execute(json!({"path": "./notes.md"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out, "# notes");
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "s").unwrap();

        let err = ReadFileTool
            .execute(json!({"path": "../secret.txt"}), &ctx(&inner))
            .await
            .unwrap_err();
        assert!(err.contains("Path escape"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool.execute(json!({}), &ctx(dir.path())).await.unwrap_err();
        assert!(err.contains("Invalid arguments"));
    }
}
