//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__AGENT__MAX_ITERATIONS=10`）。
//! AgentConfig 是 Agent 对外暴露的只读运行配置，由 AppConfig 推导，也可在代码中直接构造。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 默认单任务最大迭代数
pub const DEFAULT_MAX_ITERATIONS: usize = 25;
/// 默认任务超时（15 分钟）
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 15 * 60;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub prompt: PromptSection,
}

/// [agent] 段：迭代上限、超时、输出 token 预算、工作目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
    /// 任务超时（秒）；0 表示不设超时
    pub task_timeout_secs: u64,
    pub max_tokens: u32,
    /// 工具执行与规则文件查找的根目录，未设置时用当前目录
    pub working_dir: Option<PathBuf>,
    /// 转发给 provider 的用户身份
    pub user_id: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            max_tokens: 8192,
            working_dir: None,
            user_id: None,
        }
    }
}

/// [tools] 段：单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 120,
        }
    }
}

/// [prompt] 段：基础系统提示词与规则文件（glob，相对工作目录）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    pub base: Option<String>,
    pub rule_files: Vec<String>,
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            base: None,
            rule_files: vec!["AGENTS.md".into(), ".hive/rules/*.md".into()],
        }
    }
}

/// Agent 的只读运行配置
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
    /// None 表示不设任务超时
    pub task_timeout: Option<Duration>,
    pub max_tokens: u32,
    pub working_dir: PathBuf,
    pub user_id: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AgentConfig {
    fn from(cfg: &AppConfig) -> Self {
        let working_dir = cfg
            .agent
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        if cfg.agent.max_iterations == 0 {
            tracing::warn!("agent.max_iterations is 0, using 1");
        }
        Self {
            max_iterations: cfg.agent.max_iterations.max(1),
            task_timeout: match cfg.agent.task_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_tokens: cfg.agent.max_tokens,
            working_dir,
            user_id: cfg.agent.user_id.clone(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
///
/// agent.max_iterations 为 0 时返回错误
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    if cfg.agent.max_iterations == 0 {
        return Err(config::ConfigError::Message(
            "agent.max_iterations must be at least 1".to_string(),
        ));
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.task_timeout, Some(Duration::from_secs(900)));
        assert_eq!(AppConfig::default().prompt.rule_files.len(), 2);
    }

    #[test]
    fn test_zero_timeout_disables_and_iterations_clamped() {
        let mut app = AppConfig::default();
        app.agent.task_timeout_secs = 0;
        app.agent.max_iterations = 0;
        let cfg = AgentConfig::from(&app);
        assert_eq!(cfg.task_timeout, None);
        assert_eq!(cfg.max_iterations, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.toml");
        std::fs::write(
            &path,
            "[agent]\nmax_iterations = 7\ntask_timeout_secs = 30\n\n[tools]\ntool_timeout_secs = 5\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.agent.max_iterations, 7);
        assert_eq!(cfg.agent.task_timeout_secs, 30);
        assert_eq!(cfg.agent.max_tokens, 8192);
        assert_eq!(cfg.tools.tool_timeout_secs, 5);
    }

    #[test]
    fn test_zero_max_iterations_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.toml");
        std::fs::write(&path, "[agent]\nmax_iterations = 0\n").unwrap();
        let err = load_config(Some(path)).unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }
}
