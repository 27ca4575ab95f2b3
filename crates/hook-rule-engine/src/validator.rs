//! 配置校验
//!
//! 检查规则和注册表中的悬空引用（错误）以及无效的正则、glob 模式（告警）。
//! 运行时这些问题都按不匹配处理，校验只用于提前暴露配置错误。

use crate::evaluator::{ConditionEvaluator, MAX_DEPTH};
use crate::models::{Action, ActionKind, Condition, LeafCondition, RuleSet};
use crate::operators::{LeafKind, StringOperator};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// 校验结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 配置校验器
pub struct ConfigValidator<'a> {
    ruleset: &'a RuleSet,
    report: ValidationReport,
}

impl<'a> ConfigValidator<'a> {
    /// 校验整个规则集
    pub fn validate(ruleset: &'a RuleSet) -> ValidationReport {
        let mut validator = Self {
            ruleset,
            report: ValidationReport::default(),
        };
        validator.check_rules();
        validator.check_registries();
        validator.report
    }

    fn check_rules(&mut self) {
        let ruleset = self.ruleset;
        let mut seen = HashSet::new();

        for rule in &ruleset.rules {
            let owner = format!("规则 '{}'", rule.id);

            if rule.id.is_empty() {
                self.report.warnings.push("存在没有 id 的规则".to_string());
            } else if !seen.insert(rule.id.as_str()) {
                self.report.warnings.push(format!("{} 的 id 重复", owner));
            }

            if !rule.trigger.matcher.is_empty() && Regex::new(&rule.trigger.matcher).is_err() {
                self.report.warnings.push(format!(
                    "{} 的工具匹配正则无效，规则永远不会触发: {}",
                    owner, rule.trigger.matcher
                ));
            }

            if let Some(condition) = &rule.conditions {
                self.check_condition(condition, &owner, 0);
            }
            for action in &rule.actions {
                self.check_action(action, &owner, 0);
            }
        }
    }

    fn check_registries(&mut self) {
        let ruleset = self.ruleset;

        let mut names: Vec<_> = ruleset.conditions.keys().collect();
        names.sort();
        for name in names {
            let owner = format!("条件 '{}'", name);
            if let Some(condition) = ruleset.condition(name) {
                self.check_condition(condition, &owner, 0);
            }
        }

        let mut names: Vec<_> = ruleset.actions.keys().collect();
        names.sort();
        for name in names {
            let owner = format!("动作 '{}'", name);
            if let Some(action) = ruleset.action(name) {
                self.check_action(action, &owner, 0);
            }
        }
    }

    fn check_condition(&mut self, condition: &Condition, owner: &str, depth: usize) {
        let ruleset = self.ruleset;
        if depth > MAX_DEPTH {
            self.report
                .warnings
                .push(format!("{} 的条件嵌套超过 {} 层", owner, MAX_DEPTH));
            return;
        }

        match condition {
            Condition::Ref(reference) => match ruleset.condition(&reference.name) {
                None => self
                    .report
                    .errors
                    .push(format!("{} 引用了不存在的条件: {}", owner, reference.name)),
                Some(base) if !reference.overrides.is_empty() => {
                    // 覆盖字段可能改变模式，校验合并后的结果
                    if let Condition::Leaf(leaf) = reference.overrides.apply_to(base) {
                        self.check_leaf(&leaf, owner);
                    }
                }
                Some(_) => {}
            },
            Condition::All(children) | Condition::Any(children) => {
                for child in children {
                    self.check_condition(child, owner, depth + 1);
                }
            }
            Condition::Not(child) => self.check_condition(child, owner, depth + 1),
            Condition::Leaf(leaf) => self.check_leaf(leaf, owner),
        }
    }

    fn check_leaf(&mut self, leaf: &LeafCondition, owner: &str) {
        let problem = match leaf.kind {
            LeafKind::Regex => ConditionEvaluator::compile_regex(&leaf.pattern, leaf.ignore_case)
                .err()
                .map(|e| e.to_string()),
            LeafKind::Glob => ConditionEvaluator::compile_glob(&leaf.pattern.replace("**", "*"))
                .err()
                .map(|e| e.to_string()),
            LeafKind::Equals if leaf.operator == StringOperator::Unsupported => {
                Some("不支持的比较操作符".to_string())
            }
            LeafKind::Unsupported => Some("不支持的条件类型，求值恒为 false".to_string()),
            LeafKind::Equals | LeafKind::Exists => None,
        };

        if leaf.field.is_empty() && leaf.kind != LeafKind::Unsupported {
            self.report
                .warnings
                .push(format!("{} 的 {} 条件缺少 field", owner, leaf.kind));
        }
        if let Some(problem) = problem {
            self.report.warnings.push(format!("{}: {}", owner, problem));
        }
    }

    fn check_action(&mut self, action: &Action, owner: &str, depth: usize) {
        if depth > MAX_DEPTH {
            self.report
                .warnings
                .push(format!("{} 的动作嵌套超过 {} 层", owner, MAX_DEPTH));
            return;
        }

        match &action.kind {
            ActionKind::Ref(name) => {
                if self.ruleset.action(name).is_none() {
                    self.report
                        .errors
                        .push(format!("{} 引用了不存在的动作: {}", owner, name));
                }
            }
            ActionKind::Chain(children) => {
                for child in children {
                    self.check_action(child, owner, depth + 1);
                }
            }
            ActionKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                match condition {
                    Some(condition) => self.check_condition(condition, owner, depth + 1),
                    None => self
                        .report
                        .warnings
                        .push(format!("{} 的 conditional 动作缺少 condition", owner)),
                }
                for branch in [then, otherwise].into_iter().flatten() {
                    self.check_action(branch, owner, depth + 1);
                }
            }
            ActionKind::Unsupported(kind) => self.report.warnings.push(format!(
                "{} 使用了不支持的动作类型 '{}'，执行时跳过",
                owner, kind
            )),
            ActionKind::Decision { .. } | ActionKind::Log => {}
        }
    }
}
