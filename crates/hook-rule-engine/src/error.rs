//! 规则引擎错误类型
//!
//! 求值和执行阶段的错误只在引擎内部流转，到达 `ConditionEvaluator` /
//! `ActionExecutor` 边界时被吞掉（条件为 false，动作为空操作）。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("无效的正则表达式 '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("无效的 glob 模式 '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("条件引用不存在: {0}")]
    UnknownCondition(String),

    #[error("动作引用不存在: {0}")]
    UnknownAction(String),

    #[error("嵌套层级超过上限 {0}")]
    DepthExceeded(usize),

    #[error("事件日志写入失败 {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("读取配置文件失败 {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML 解析失败 {path}: {source}")]
    YamlError {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
