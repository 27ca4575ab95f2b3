//! 命令执行器
//!
//! 各子命令的输出写入传入的 writer，返回值为进程退出码。

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use hook_shared::config::EngineConfig;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::loader::{LoadReport, RuleSetLoader};
use crate::models::{Event, Rule};
use crate::sink::{EventSink, JsonlFileSink, NullSink};
use crate::validator::ConfigValidator;

const RULE_WIDTH: usize = 60;

/// 命令执行器
pub struct CommandRunner {
    config: EngineConfig,
}

impl CommandRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn load(&self) -> LoadReport {
        RuleSetLoader::from_config(&self.config).load()
    }

    fn header(out: &mut impl Write, title: &str) -> Result<()> {
        writeln!(out)?;
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(out, " {}", title)?;
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(out)?;
        Ok(())
    }

    /// 执行 list 命令
    pub fn run_list(&self, out: &mut impl Write) -> Result<i32> {
        let report = self.load();
        let ruleset = &report.ruleset;

        let mut rules: Vec<&Rule> = ruleset.enabled_rules().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        Self::header(
            out,
            &format!("启用的规则（{} / {}）", rules.len(), ruleset.rules.len()),
        )?;

        let mut events = BTreeSet::new();
        let mut tags = BTreeSet::new();

        for rule in &rules {
            let bar = "█".repeat((rule.priority / 10).clamp(0, 10) as usize);
            writeln!(out, "[{:3}] {}", rule.priority, bar)?;
            writeln!(out, "  ID: {}", rule.id)?;
            writeln!(out, "  名称: {}", rule.name)?;
            writeln!(
                out,
                "  触发: {} → {}",
                or_any(&rule.trigger.event),
                or_any(&rule.trigger.matcher)
            )?;
            if !rule.tags.is_empty() {
                writeln!(out, "  标签: {}", rule.tags.join(", "))?;
            }
            writeln!(out, "  动作数: {}", rule.actions.len())?;
            writeln!(out)?;

            events.insert(or_any(&rule.trigger.event).to_string());
            tags.extend(rule.tags.iter().cloned());
        }

        writeln!(out, "覆盖的事件: {}", join(&events))?;
        writeln!(out, "使用的标签: {}", join(&tags))?;
        writeln!(out, "命名条件: {}", ruleset.conditions.len())?;
        writeln!(out, "命名动作: {}", ruleset.actions.len())?;

        Ok(0)
    }

    /// 执行 test 命令
    pub fn run_test(&self, event_file: &Path, dry_run: bool, out: &mut impl Write) -> Result<i32> {
        let content = fs::read_to_string(event_file)
            .with_context(|| format!("读取事件文件失败: {}", event_file.display()))?;
        let mut event = Event::from_json(&content)
            .with_context(|| format!("事件 JSON 解析失败: {}", event_file.display()))?;
        if let Some(hook_type) = &self.config.hook_type_override {
            event = event.with_hook_type(hook_type.clone());
        }

        let report = self.load();

        Self::header(out, &format!("测试: {}", event_file.display()))?;
        writeln!(out, "事件:")?;
        writeln!(out, "  类型: {}", event.hook_type())?;
        writeln!(out, "  工具: {}", event.tool_name())?;
        writeln!(
            out,
            "  输入: {}",
            serde_json::to_string_pretty(event.tool_input())?.replace('\n', "\n  ")
        )?;
        writeln!(out)?;

        let file_sink = JsonlFileSink::new(self.config.log_file_path());
        let sink: &dyn EventSink = if dry_run { &NullSink } else { &file_sink };
        let dispatch = Dispatcher::new(sink)
            .with_trace()
            .dispatch_with_report(&event, &report.ruleset);

        info!(
            matched_rule = ?dispatch.matched_rule,
            elapsed_us = dispatch.elapsed.as_micros() as u64,
            "测试分发完成"
        );

        writeln!(out, "评估追踪:")?;
        for line in &dispatch.evaluation_trace {
            writeln!(out, "  {}", line)?;
        }
        writeln!(out)?;

        let verdict = &dispatch.verdict;
        writeln!(out, "结果:")?;
        writeln!(out, "  退出码: {}", verdict.exit_code)?;
        if let Some(decision) = verdict.decision {
            writeln!(out, "  决策: {}", decision)?;
        }
        if let Some(message) = &verdict.message {
            writeln!(out, "  消息: {}", message)?;
        }
        if let Some(rule_id) = &dispatch.matched_rule {
            writeln!(out, "  规则: {}", rule_id)?;
        }

        Ok(verdict.exit_code)
    }

    /// 执行 config show 命令
    pub fn run_config_show(&self, out: &mut impl Write) -> Result<i32> {
        let report = self.load();

        Self::header(out, "配置来源（按优先级从低到高）")?;

        for (i, source) in report.sources.iter().enumerate() {
            let status = if source.exists { "✓" } else { "✗" };
            writeln!(out, "{}. [{}] {}", i + 1, status, source.dir.display())?;
            for file in &source.files {
                match &file.error {
                    None => writeln!(out, "       └─ {} ({} bytes)", file.name, file.size)?,
                    Some(error) => writeln!(out, "       └─ {} 解析失败: {}", file.name, error)?,
                }
            }
        }
        writeln!(out)?;

        let ruleset = &report.ruleset;
        writeln!(out, "合并结果:")?;
        writeln!(out, "  规则: {}", ruleset.rules.len())?;
        writeln!(out, "  条件: {}", ruleset.conditions.len())?;
        writeln!(out, "  动作: {}", ruleset.actions.len())?;
        if let Some(scripts_dir) = &ruleset.scripts_dir {
            writeln!(out, "  脚本目录: {}", scripts_dir.display())?;
        }
        writeln!(out, "  事件日志: {}", self.config.log_file_path().display())?;

        Ok(0)
    }

    /// 执行 config validate 命令
    pub fn run_config_validate(&self, out: &mut impl Write) -> Result<i32> {
        let report = self.load();

        Self::header(out, "校验配置")?;

        // 解析失败的文件排在最前
        let mut validation = ConfigValidator::validate(&report.ruleset);
        let mut errors: Vec<String> = report
            .failed_files()
            .filter_map(|file| file.error.clone())
            .collect();
        errors.append(&mut validation.errors);
        validation.errors = errors;

        if !validation.errors.is_empty() {
            writeln!(out, "错误:")?;
            for error in &validation.errors {
                writeln!(out, "  ✗ {}", error)?;
            }
            writeln!(out)?;
        }

        if !validation.warnings.is_empty() {
            writeln!(out, "告警:")?;
            for warning in &validation.warnings {
                writeln!(out, "  ⚠ {}", warning)?;
            }
            writeln!(out)?;
        }

        if validation.is_clean() {
            writeln!(out, "✓ 配置有效")?;
        }

        Ok(if validation.is_valid() { 0 } else { 1 })
    }
}

fn or_any(value: &str) -> &str {
    if value.is_empty() { "*" } else { value }
}

fn join(values: &BTreeSet<String>) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
