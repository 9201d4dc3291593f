//! 文件附件缓存接口
//!
//! 任务可携带附件（路径）；配置了缓存时在首轮推理前缓存一次，结果表随每次模型请求一起下发。

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            media_type: None,
        }
    }
}

/// 缓存后的附件（provider 侧可用的引用）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedAttachment {
    pub file_id: String,
    pub media_type: String,
}

/// 以附件路径（字符串形式）为键的缓存表
pub type AttachmentMap = HashMap<String, CachedAttachment>;

#[async_trait]
pub trait AttachmentCache: Send + Sync {
    async fn cache(&self, attachments: &[Attachment]) -> anyhow::Result<AttachmentMap>;
}
