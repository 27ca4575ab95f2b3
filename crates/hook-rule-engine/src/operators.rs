//! 条件类型、比较操作符与决策定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 叶子条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafKind {
    /// 正则匹配
    Regex,
    /// glob 匹配（默认只匹配文件名部分）
    Glob,
    /// 字符串比较，具体方式由 `StringOperator` 决定
    Equals,
    /// 字段存在性检查
    Exists,
    /// 无法识别的类型（如 script、builtin），求值恒为 false
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Regex => "regex",
            Self::Glob => "glob",
            Self::Equals => "equals",
            Self::Exists => "exists",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{}", s)
    }
}

/// 字符串比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringOperator {
    #[default]
    Equals,
    #[serde(alias = "starts_with")]
    StartsWith,
    #[serde(alias = "ends_with")]
    EndsWith,
    Contains,
    /// 无法识别的操作符，比较结果恒为 false
    #[serde(other)]
    Unsupported,
}

impl StringOperator {
    /// 用操作符比较字段值和字面量
    pub fn compare(self, field: &str, literal: &str) -> bool {
        match self {
            Self::Equals => field == literal,
            Self::StartsWith => field.starts_with(literal),
            Self::EndsWith => field.ends_with(literal),
            Self::Contains => field.contains(literal),
            Self::Unsupported => false,
        }
    }
}

impl fmt::Display for StringOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{}", s)
    }
}

/// 决策动作中声明的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Allow,
    #[serde(alias = "block")]
    Deny,
    Ask,
    /// 空或无法识别的决策：退出码 0，不带决策
    #[default]
    #[serde(other)]
    Passthrough,
}

/// 返回给宿主的权限决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Deny,
    Ask,
}

impl PermissionDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Ask => "ask",
        }
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
