//! 配置管理模块
//!
//! 引擎自身的运行配置（搜索路径、默认日志文件、日志级别），
//! 支持配置文件加载与环境变量覆盖。规则本身的 YAML 定义不在这里加载。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::observability::ObservabilityConfig;

/// 规则搜索目录的环境变量（项目级配置）
pub const ENV_PROJECT_DIR: &str = "CLAUDE_PROJECT_DIR";

/// 覆盖事件 hook 类型的环境变量
pub const ENV_HOOK_TYPE: &str = "CLAUDE_HOOK_TYPE";

/// 指定引擎配置文件路径的环境变量
pub const ENV_CONFIG_FILE: &str = "HOOKS_CONFIG";

/// 默认的事件日志文件
pub const DEFAULT_LOG_FILE: &str = "~/.claude/logs/hooks.jsonl";

/// 引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 规则搜索目录，按优先级从低到高排列（后面的目录覆盖前面的同名定义）
    pub search_paths: Vec<PathBuf>,
    /// `log` 动作未指定 `log_file` 参数时使用的日志文件
    pub log_file: String,
    /// 来自 CLAUDE_HOOK_TYPE 的 hook 类型覆盖
    pub hook_type_override: Option<String>,
    pub observability: ObservabilityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_paths: default_search_paths(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            hook_type_override: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. 内置默认值
    /// 2. HOOKS_CONFIG 指定的文件，未设置时为 ~/.claude-hooks/engine.toml
    /// 3. 环境变量（HOOKS_ 前缀，嵌套字段用双下划线，如 HOOKS_OBSERVABILITY__LOG_LEVEL）
    /// 4. CLAUDE_HOOK_TYPE
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = std::env::var_os(ENV_CONFIG_FILE)
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|home| home.join(".claude-hooks").join("engine.toml")));

        Self::load_from(config_file.as_deref())
    }

    /// 从指定配置文件加载（文件不存在时只使用默认值和环境变量）
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let builder = builder.add_source(
            Environment::with_prefix("HOOKS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("search_paths")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Some(hook_type) = std::env::var(ENV_HOOK_TYPE).ok().filter(|s| !s.is_empty()) {
            config.hook_type_override = Some(hook_type);
        }

        tracing::debug!(
            search_paths = ?config.search_paths,
            log_file = %config.log_file,
            "引擎配置已加载"
        );

        Ok(config)
    }

    /// 展开 `~/` 后的默认日志文件路径
    pub fn log_file_path(&self) -> PathBuf {
        expand_home(&self.log_file)
    }
}

/// 默认规则搜索目录
///
/// 1. ~/.claude-hooks
/// 2. ~/.claude
/// 3. $CLAUDE_PROJECT_DIR/.claude（设置时）
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(home) = home_dir() {
        paths.push(home.join(".claude-hooks"));
        paths.push(home.join(".claude"));
    }

    if let Some(project_dir) = std::env::var_os(ENV_PROJECT_DIR).filter(|s| !s.is_empty()) {
        paths.push(PathBuf::from(project_dir).join(".claude"));
    }

    paths
}

/// 用户主目录（HOME 优先，未设置时查询系统账户信息）
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// 展开路径开头的 `~/`
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
