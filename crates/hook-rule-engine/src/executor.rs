//! 动作执行器
//!
//! 递归执行动作，至多产生一个判定结果。`None` 表示非终止（继续执行后续动作），
//! `Some` 表示终止分发。执行过程中的错误全部吞掉并记录日志。

use crate::error::{Result, RuleError};
use crate::evaluator::{ConditionEvaluator, MAX_DEPTH};
use crate::models::{Action, ActionKind, Event, Params, RuleSet, Verdict};
use crate::operators::DecisionKind;
use crate::sink::{EventRecord, EventSink};
use crate::template::render_message;
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, warn};

/// `log` 动作指定目标文件的参数名
pub const PARAM_LOG_FILE: &str = "log_file";

/// 动作执行器
pub struct ActionExecutor<'a> {
    ruleset: &'a RuleSet,
    sink: &'a dyn EventSink,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(ruleset: &'a RuleSet, sink: &'a dyn EventSink) -> Self {
        Self { ruleset, sink }
    }

    /// 执行动作
    pub fn execute(&self, action: &Action, event: &Event) -> Option<Verdict> {
        match self.execute_node(action, event, 0) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, "动作执行中止，按非终止处理");
                None
            }
        }
    }

    fn execute_node(&self, action: &Action, event: &Event, depth: usize) -> Result<Option<Verdict>> {
        if depth > MAX_DEPTH {
            return Err(RuleError::DepthExceeded(MAX_DEPTH));
        }

        match &action.kind {
            ActionKind::Ref(name) => {
                let Some(base) = self.ruleset.action(name) else {
                    debug!(name = %name, "动作引用不存在");
                    return Ok(None);
                };
                // 调用方参数覆盖被引用动作的同名参数
                let mut merged = base.clone();
                merged
                    .params
                    .extend(action.params.iter().map(|(k, v)| (k.clone(), v.clone())));
                self.execute_node(&merged, event, depth + 1)
            }
            ActionKind::Decision { decision, message } => {
                Ok(Some(Self::decide(*decision, message, event, &action.params)))
            }
            ActionKind::Log => {
                self.log(event, &action.params);
                Ok(None)
            }
            ActionKind::Chain(children) => {
                for child in children {
                    let child = inherit_params(child, &action.params);
                    if let Some(verdict) = self.execute_node(&child, event, depth + 1)? {
                        return Ok(Some(verdict));
                    }
                }
                Ok(None)
            }
            ActionKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let Some(condition) = condition else {
                    return Ok(None);
                };
                let branch = if ConditionEvaluator::evaluate(Some(condition), event, self.ruleset) {
                    then
                } else {
                    otherwise
                };
                match branch {
                    Some(branch) => self.execute_node(branch, event, depth + 1),
                    None => Ok(None),
                }
            }
            ActionKind::Unsupported(kind) => {
                debug!(kind = %kind, "不支持的动作类型，跳过");
                Ok(None)
            }
        }
    }

    /// 生成决策结果
    fn decide(decision: DecisionKind, template: &str, event: &Event, params: &Params) -> Verdict {
        match decision {
            DecisionKind::Deny => Verdict::deny(render_message(template, event, params)),
            DecisionKind::Allow => Verdict::allow(),
            DecisionKind::Ask => Verdict::ask(render_message(template, event, params)),
            DecisionKind::Passthrough => Verdict::continue_normally(),
        }
    }

    /// 写事件日志，失败只记录告警
    fn log(&self, event: &Event, params: &Params) {
        let log_file = params
            .get(PARAM_LOG_FILE)
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Err(e) = self.sink.append(&EventRecord::from_event(event), log_file) {
            warn!(error = %e, "事件日志写入失败");
        }
    }
}

/// 父动作参数只补充子动作未定义的键
fn inherit_params<'b>(child: &'b Action, parent: &Params) -> Cow<'b, Action> {
    if parent.keys().all(|key| child.params.contains_key(key)) {
        return Cow::Borrowed(child);
    }

    let mut child = child.clone();
    for (key, value) in parent {
        child
            .params
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    Cow::Owned(child)
}
