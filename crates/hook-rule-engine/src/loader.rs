//! 分层 YAML 配置加载
//!
//! 按搜索目录顺序加载，每个目录中依次读取：
//! - `conditions.yaml`：`conditions:` 下的命名条件，后加载的覆盖同名定义
//! - `actions.yaml`：`actions:` 下的命名动作，后加载的覆盖同名定义
//! - `rules.yaml`、`hooks.yaml`：`rules:` 下的规则列表，按顺序追加
//!
//! 缺失的文件直接跳过，解析失败的文件记录告警后跳过。

use crate::error::{Result, RuleError};
use crate::models::{Action, Condition, Rule, RuleSet};
use hook_shared::config::EngineConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONDITIONS_FILE: &str = "conditions.yaml";
pub const ACTIONS_FILE: &str = "actions.yaml";
pub const RULES_FILE: &str = "rules.yaml";
pub const HOOKS_FILE: &str = "hooks.yaml";
pub const SCRIPTS_DIR: &str = "scripts";

#[derive(Debug, Default, Deserialize)]
struct ConditionsFile {
    #[serde(default)]
    conditions: Option<HashMap<String, Condition>>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionsFile {
    #[serde(default)]
    actions: Option<HashMap<String, Action>>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Option<Vec<Rule>>,
}

/// 单个配置文件的加载情况
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: &'static str,
    pub path: PathBuf,
    pub size: u64,
    /// 解析失败时的错误描述
    pub error: Option<String>,
}

/// 单个搜索目录的加载情况
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub dir: PathBuf,
    pub exists: bool,
    pub files: Vec<SourceFile>,
}

/// 加载结果
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub ruleset: RuleSet,
    pub sources: Vec<ConfigSource>,
}

impl LoadReport {
    /// 所有解析失败的文件
    pub fn failed_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.sources
            .iter()
            .flat_map(|source| source.files.iter())
            .filter(|file| file.error.is_some())
    }
}

/// 规则集加载器
#[derive(Debug, Clone)]
pub struct RuleSetLoader {
    search_paths: Vec<PathBuf>,
}

impl RuleSetLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.search_paths.clone())
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// 加载并合并所有搜索目录
    pub fn load(&self) -> LoadReport {
        let mut report = LoadReport::default();

        for dir in &self.search_paths {
            let source = Self::load_dir(dir, &mut report.ruleset);
            report.sources.push(source);
        }

        debug!(
            rules = report.ruleset.rules.len(),
            conditions = report.ruleset.conditions.len(),
            actions = report.ruleset.actions.len(),
            "规则集加载完成"
        );

        report
    }

    /// 把单个目录合并到规则集中
    fn load_dir(dir: &Path, ruleset: &mut RuleSet) -> ConfigSource {
        let mut source = ConfigSource {
            dir: dir.to_path_buf(),
            exists: dir.is_dir(),
            files: Vec::new(),
        };
        if !source.exists {
            return source;
        }

        if let Some(file) = Self::read_file::<ConditionsFile>(dir, CONDITIONS_FILE, &mut source) {
            ruleset.conditions.extend(file.conditions.unwrap_or_default());
        }

        if let Some(file) = Self::read_file::<ActionsFile>(dir, ACTIONS_FILE, &mut source) {
            ruleset.actions.extend(file.actions.unwrap_or_default());
        }

        for name in [RULES_FILE, HOOKS_FILE] {
            if let Some(file) = Self::read_file::<RulesFile>(dir, name, &mut source) {
                ruleset.rules.extend(file.rules.unwrap_or_default());
            }
        }

        let scripts_dir = dir.join(SCRIPTS_DIR);
        if scripts_dir.is_dir() {
            ruleset.scripts_dir = Some(scripts_dir);
        }

        source
    }

    /// 读取一个文件并记录加载情况，缺失或失败时返回 None
    fn read_file<T>(dir: &Path, name: &'static str, source: &mut ConfigSource) -> Option<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = dir.join(name);
        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => return None,
        };

        let result = parse_yaml_file::<T>(&path);
        let error = result.as_ref().err().map(|e| e.to_string());
        if let Some(error) = &error {
            warn!(path = %path.display(), error = %error, "配置文件解析失败，已跳过");
        }

        source.files.push(SourceFile {
            name,
            path,
            size,
            error,
        });

        result.ok().flatten()
    }
}

/// 解析 YAML 文件，文件不存在时返回 None，空文件返回默认值
pub fn parse_yaml_file<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned + Default,
{
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(RuleError::ConfigRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if content.trim().is_empty() {
        return Ok(Some(T::default()));
    }

    serde_yaml_ng::from_str(&content)
        .map(Some)
        .map_err(|source| RuleError::YamlError {
            path: path.to_path_buf(),
            source,
        })
}
