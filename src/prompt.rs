//! 系统提示词加载
//!
//! 每个任务开始时重新加载一次（不跨任务缓存），外部规则文件的修改对下一个任务立即生效。
//! 基础提示词之后按 glob 顺序追加规则文件内容；找不到的文件静默跳过。

use std::path::Path;

use crate::config::PromptSection;

const DEFAULT_BASE_PROMPT: &str = "You are Hive, an autonomous coding agent. \
Work in the user's working directory, call tools when you need information or to make changes, \
and finish with a concise summary once the task is done.";

#[derive(Debug, Clone)]
pub struct SystemPromptLoader {
    base: String,
    rule_files: Vec<String>,
}

impl Default for SystemPromptLoader {
    fn default() -> Self {
        Self::from_section(&PromptSection::default())
    }
}

impl SystemPromptLoader {
    pub fn new(base: impl Into<String>, rule_files: Vec<String>) -> Self {
        Self {
            base: base.into(),
            rule_files,
        }
    }

    pub fn from_section(section: &PromptSection) -> Self {
        Self::new(
            section
                .base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_PROMPT.to_string()),
            section.rule_files.clone(),
        )
    }

    /// 组装系统提示词：基础提示词 + 工作目录 + 各规则文件
    pub fn load(&self, working_dir: &Path) -> String {
        let mut prompt = self.base.clone();
        prompt.push_str(&format!("\n\nWorking directory: {}", working_dir.display()));

        for pattern in &self.rule_files {
            let full = working_dir.join(pattern);
            let paths = match glob::glob(&full.to_string_lossy()) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, "invalid rule file pattern: {}", e);
                    continue;
                }
            };
            let mut matched: Vec<_> = paths.filter_map(Result::ok).collect();
            matched.sort();
            for path in matched {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    let rel = path.strip_prefix(working_dir).unwrap_or(&path);
                    prompt.push_str(&format!("\n\n# Rules from {}\n\n{}", rel.display(), content.trim()));
                }
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "Use tabs.").unwrap();
        std::fs::create_dir_all(dir.path().join(".hive/rules")).unwrap();
        std::fs::write(dir.path().join(".hive/rules/b.md"), "Rule B").unwrap();
        std::fs::write(dir.path().join(".hive/rules/a.md"), "Rule A").unwrap();

        let prompt = SystemPromptLoader::new("BASE", PromptSection::default().rule_files).load(dir.path());
        assert!(prompt.starts_with("BASE"));
        let tabs = prompt.find("Use tabs.").unwrap();
        let a = prompt.find("Rule A").unwrap();
        let b = prompt.find("Rule B").unwrap();
        assert!(tabs < a && a < b);
        assert!(prompt.contains("# Rules from AGENTS.md"));
    }

    #[test]
    fn test_reload_sees_new_rules() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SystemPromptLoader::new("BASE", vec!["AGENTS.md".into()]);
        assert!(!loader.load(dir.path()).contains("Rules from"));
        std::fs::write(dir.path().join("AGENTS.md"), "Be brief.").unwrap();
        assert!(loader.load(dir.path()).contains("Be brief."));
    }
}
