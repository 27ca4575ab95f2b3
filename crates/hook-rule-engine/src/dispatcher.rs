//! 规则分发器
//!
//! 按优先级从高到低遍历启用的规则：匹配触发器，评估根条件，依次执行动作，
//! 第一个终止结果即为本次分发的判定；没有任何终止结果时返回默认判定。

use crate::evaluator::ConditionEvaluator;
use crate::executor::ActionExecutor;
use crate::models::{Event, Rule, RuleSet, Trigger, Verdict};
use crate::sink::EventSink;
use regex::Regex;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// 一次分发的详细结果
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub verdict: Verdict,
    /// 产生终止结果的规则 ID
    pub matched_rule: Option<String>,
    pub evaluation_trace: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DispatchReport {
    fn new() -> Self {
        Self {
            verdict: Verdict::continue_normally(),
            matched_rule: None,
            evaluation_trace: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

/// 规则分发器
pub struct Dispatcher<'a> {
    sink: &'a dyn EventSink,
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self {
            sink,
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 分发事件，返回唯一的判定结果
    pub fn dispatch(&self, event: &Event, ruleset: &RuleSet) -> Verdict {
        self.dispatch_with_report(event, ruleset).verdict
    }

    /// 分发事件并返回匹配规则、追踪信息和耗时
    #[instrument(
        skip(self, event, ruleset),
        fields(hook_type = %event.hook_type(), tool_name = %event.tool_name())
    )]
    pub fn dispatch_with_report(&self, event: &Event, ruleset: &RuleSet) -> DispatchReport {
        let start = Instant::now();
        let mut report = DispatchReport::new();

        // 稳定排序：同优先级保持声明顺序
        let mut rules: Vec<&Rule> = ruleset.enabled_rules().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let executor = ActionExecutor::new(ruleset, self.sink);

        for rule in rules {
            if !Self::matches_trigger(&rule.trigger, event) {
                self.trace(&mut report, || format!("{}: 触发器不匹配", rule.id));
                continue;
            }

            if !ConditionEvaluator::evaluate(rule.conditions.as_ref(), event, ruleset) {
                self.trace(&mut report, || format!("{}: 条件不满足", rule.id));
                continue;
            }

            self.trace(&mut report, || {
                format!("{}: 条件满足，执行 {} 个动作", rule.id, rule.actions.len())
            });

            for (i, action) in rule.actions.iter().enumerate() {
                if let Some(verdict) = executor.execute(action, event) {
                    debug!(rule_id = %rule.id, exit_code = verdict.exit_code, "规则产生终止结果");
                    self.trace(&mut report, || {
                        format!("{}: 动作[{}] 终止分发 (exit {})", rule.id, i, verdict.exit_code)
                    });
                    report.verdict = verdict;
                    report.matched_rule = Some(rule.id.clone());
                    report.elapsed = start.elapsed();
                    return report;
                }
            }
        }

        self.trace(&mut report, || "没有规则产生终止结果".to_string());
        report.elapsed = start.elapsed();
        report
    }

    /// 匹配触发器：事件类型相等，工具名匹配正则（无效正则视为不匹配）
    pub fn matches_trigger(trigger: &Trigger, event: &Event) -> bool {
        if !trigger.event.is_empty() && trigger.event != event.hook_type() {
            return false;
        }

        if trigger.matcher.is_empty() {
            return true;
        }

        match Regex::new(&trigger.matcher) {
            Ok(regex) => regex.is_match(event.tool_name()),
            Err(e) => {
                warn!(matcher = %trigger.matcher, error = %e, "无效的工具匹配正则");
                false
            }
        }
    }

    fn trace(&self, report: &mut DispatchReport, line: impl FnOnce() -> String) {
        if self.trace_enabled {
            report.evaluation_trace.push(line());
        }
    }
}
