//! 统一可观测性模块
//!
//! 分发器与 hookctl 通过单一入口初始化日志。stdout 是与宿主通信的协议通道，
//! 所以所有日志都写到 stderr。

pub mod tracing;

use serde::Deserialize;

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 日志级别（如 "warn", "debug"），RUST_LOG 优先
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 是否输出 JSON 格式日志
    pub fn is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// 覆盖日志级别（hookctl 的 --verbose 使用）
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

pub use self::tracing::init;
