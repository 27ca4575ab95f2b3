//! 事件日志
//!
//! `log` 动作把事件追加为 JSONL 记录。写入目标由动作参数 `log_file` 指定，
//! 未指定时使用引擎配置的默认文件。

use crate::error::{Result, RuleError};
use crate::models::Event;
use chrono::{Local, SecondsFormat};
use hook_shared::config::{DEFAULT_LOG_FILE, expand_home};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 一条事件日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub event_type: String,
    pub tool_name: String,
    pub tool_input: Map<String, Value>,
    pub session_id: String,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            event_type: event.hook_type().to_string(),
            tool_name: event.tool_name().to_string(),
            tool_input: event.tool_input().clone(),
            session_id: event.session_id().to_string(),
        }
    }
}

/// 事件日志写入接口
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// 追加一条记录，`log_file` 为动作参数中指定的目标文件
    fn append(&self, record: &EventRecord, log_file: Option<String>) -> Result<()>;
}

/// 追加写入 JSONL 文件
#[derive(Debug, Clone)]
pub struct JsonlFileSink {
    default_path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    fn resolve(&self, log_file: Option<String>) -> PathBuf {
        match log_file {
            Some(path) if !path.is_empty() => expand_home(&path),
            _ => self.default_path.clone(),
        }
    }
}

impl Default for JsonlFileSink {
    fn default() -> Self {
        Self::new(expand_home(DEFAULT_LOG_FILE))
    }
}

impl EventSink for JsonlFileSink {
    fn append(&self, record: &EventRecord, log_file: Option<String>) -> Result<()> {
        let path = self.resolve(log_file);
        let sink_error = |source| RuleError::Sink {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(sink_error)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(sink_error)?;
        file.write_all(line.as_bytes()).map_err(sink_error)?;

        Ok(())
    }
}

/// 丢弃所有记录
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn append(&self, _record: &EventRecord, _log_file: Option<String>) -> Result<()> {
        Ok(())
    }
}
