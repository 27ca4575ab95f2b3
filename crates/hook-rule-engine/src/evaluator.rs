//! 条件评估器
//!
//! 递归求值条件树：引用解析、all/any/not 组合以及 regex/glob/equals/exists 叶子匹配。
//! 求值永不失败，内部错误（无效模式、悬空引用、嵌套过深）一律按不匹配处理。

use crate::error::{Result, RuleError};
use crate::models::{Condition, Event, LeafCondition, RuleSet, stringify};
use crate::operators::LeafKind;
use globset::GlobBuilder;
use regex::Regex;
use tracing::{debug, warn};

/// 引用链与嵌套的最大深度
pub const MAX_DEPTH: usize = 32;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `condition` - 规则的根条件，缺省时视为匹配
    /// * `event` - 当前事件
    /// * `ruleset` - 用于解析条件引用的规则集
    pub fn evaluate(condition: Option<&Condition>, event: &Event, ruleset: &RuleSet) -> bool {
        let Some(condition) = condition else {
            return true;
        };

        match Self::evaluate_node(condition, event, ruleset, 0) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "条件求值中止，按不匹配处理");
                false
            }
        }
    }

    /// 递归评估条件节点
    ///
    /// 只有嵌套过深会向上传播，让整棵条件树失败；其余错误在所在节点变为 false。
    pub(crate) fn evaluate_node(
        condition: &Condition,
        event: &Event,
        ruleset: &RuleSet,
        depth: usize,
    ) -> Result<bool> {
        if depth > MAX_DEPTH {
            return Err(RuleError::DepthExceeded(MAX_DEPTH));
        }

        match condition {
            Condition::Ref(reference) => {
                let Some(base) = ruleset.condition(&reference.name) else {
                    debug!(name = %reference.name, "条件引用不存在");
                    return Ok(false);
                };
                let merged = reference.overrides.apply_to(base);
                Self::evaluate_node(&merged, event, ruleset, depth + 1)
            }
            Condition::All(children) => {
                for child in children {
                    if !Self::evaluate_node(child, event, ruleset, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(children) => {
                for child in children {
                    if Self::evaluate_node(child, event, ruleset, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(child) => {
                Ok(!Self::evaluate_node(child, event, ruleset, depth + 1)?)
            }
            Condition::Leaf(leaf) => match Self::evaluate_leaf(leaf, event) {
                Ok(matched) => Ok(matched),
                Err(e) => {
                    warn!(field = %leaf.field, kind = %leaf.kind, error = %e, "叶子条件无效");
                    Ok(false)
                }
            },
        }
    }

    /// 评估叶子条件，字段缺失时任何类型都不匹配
    fn evaluate_leaf(leaf: &LeafCondition, event: &Event) -> Result<bool> {
        let Some(value) = event.get_field(&leaf.field) else {
            return Ok(false);
        };

        match leaf.kind {
            LeafKind::Exists => Ok(true),
            LeafKind::Regex => Self::regex_match(&leaf.pattern, &stringify(value), leaf.ignore_case),
            LeafKind::Glob => Self::glob_match(&leaf.pattern, &stringify(value)),
            LeafKind::Equals => Ok(leaf.operator.compare(&stringify(value), &leaf.value)),
            LeafKind::Unsupported => Ok(false),
        }
    }

    /// 正则表达式匹配
    pub fn regex_match(pattern: &str, value: &str, ignore_case: bool) -> Result<bool> {
        Ok(Self::compile_regex(pattern, ignore_case)?.is_match(value))
    }

    /// 编译正则表达式，忽略大小写时加 `(?i)` 前缀
    pub fn compile_regex(pattern: &str, ignore_case: bool) -> Result<Regex> {
        let source = if ignore_case {
            format!("(?i){}", pattern)
        } else {
            pattern.to_string()
        };

        Regex::new(&source).map_err(|source| RuleError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
    }

    /// glob 匹配
    ///
    /// 不含 `/` 的模式匹配文件名部分，含 `/` 的模式匹配完整路径；
    /// 模式含 `**` 时再把它折叠成 `*` 对完整路径尝试一次。
    /// `{a,b}` 按多选一匹配。
    pub fn glob_match(pattern: &str, value: &str) -> Result<bool> {
        let collapsed = pattern.replace("**", "*");
        let matcher = Self::compile_glob(&collapsed)?;

        let target = if pattern.contains('/') {
            value
        } else {
            base_name(value)
        };
        if matcher.is_match(target) {
            return Ok(true);
        }

        Ok(pattern.contains("**") && matcher.is_match(value))
    }

    /// 编译 glob 模式（`*` 不跨越路径分隔符）
    pub fn compile_glob(pattern: &str) -> Result<globset::GlobMatcher> {
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|source| RuleError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })
    }
}

/// 路径的最后一段，忽略结尾的分隔符
fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionOverrides, ConditionRef};
    use crate::operators::StringOperator;
    use serde_json::json;

    fn create_test_event() -> Event {
        Event::from_json(
            &json!({
                "hook_type": "pre_tool",
                "tool_name": "Bash",
                "session_id": "sess-1",
                "tool_input": {
                    "command": "rm -rf /tmp/build",
                    "path": "/home/dev/project/.env",
                    "count": 3,
                    "nested": {"flag": true}
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn leaf(kind: LeafKind, field: &str, pattern: &str) -> Condition {
        let mut leaf = LeafCondition::new(kind, field);
        leaf.pattern = pattern.to_string();
        Condition::Leaf(leaf)
    }

    fn equals(field: &str, operator: StringOperator, value: &str) -> Condition {
        let mut leaf = LeafCondition::new(LeafKind::Equals, field);
        leaf.operator = operator;
        leaf.value = value.to_string();
        Condition::Leaf(leaf)
    }

    fn eval(condition: &Condition, ruleset: &RuleSet) -> bool {
        ConditionEvaluator::evaluate(Some(condition), &create_test_event(), ruleset)
    }

    #[test]
    fn test_absent_condition_matches() {
        assert!(ConditionEvaluator::evaluate(None, &create_test_event(), &RuleSet::default()));
    }

    #[test]
    fn test_regex() {
        let ruleset = RuleSet::default();
        assert!(eval(&leaf(LeafKind::Regex, "tool_input.command", r"^rm\s+-rf"), &ruleset));
        assert!(!eval(&leaf(LeafKind::Regex, "tool_input.command", "^git"), &ruleset));
        assert!(!eval(&leaf(LeafKind::Regex, "tool_name", "^bash$"), &ruleset));
    }

    #[test]
    fn test_regex_ignore_case() {
        let mut condition = LeafCondition::new(LeafKind::Regex, "tool_name");
        condition.pattern = "^bash$".to_string();
        condition.ignore_case = true;
        assert!(eval(&Condition::Leaf(condition), &RuleSet::default()));
    }

    #[test]
    fn test_invalid_regex_is_false() {
        let ruleset = RuleSet::default();
        let invalid = leaf(LeafKind::Regex, "tool_name", "([unclosed");
        assert!(!eval(&invalid, &ruleset));
        assert!(ConditionEvaluator::regex_match("([unclosed", "x", false).is_err());
    }

    #[test]
    fn test_glob_basename() {
        let ruleset = RuleSet::default();
        assert!(eval(&leaf(LeafKind::Glob, "tool_input.path", "*.env"), &ruleset));
        assert!(eval(&leaf(LeafKind::Glob, "tool_input.path", ".env"), &ruleset));
        assert!(!eval(&leaf(LeafKind::Glob, "tool_input.path", "*.txt"), &ruleset));
    }

    #[test]
    fn test_glob_full_path() {
        assert!(ConditionEvaluator::glob_match("/etc/*", "/etc/passwd").unwrap());
        assert!(!ConditionEvaluator::glob_match("/etc/*", "/etc/ssh/sshd_config").unwrap());
        assert!(!ConditionEvaluator::glob_match("/etc/*", "/var/etc/passwd").unwrap());
    }

    #[test]
    fn test_glob_double_star() {
        assert!(ConditionEvaluator::glob_match("/home/**/.env", "/home/dev/.env").unwrap());
        assert!(ConditionEvaluator::glob_match("secrets/**", "secrets/key.pem").unwrap());
        assert!(ConditionEvaluator::glob_match("**.pem", "/keys/server.pem").unwrap());
    }

    #[test]
    fn test_glob_brace_alternation() {
        assert!(ConditionEvaluator::glob_match("*.{pem,key}", "/etc/ssl/server.key").unwrap());
        assert!(ConditionEvaluator::glob_match("*.{pem,key}", "certs/ca.pem").unwrap());
        assert!(!ConditionEvaluator::glob_match("*.{pem,key}", "notes.{pem,key}.txt").unwrap());
    }

    #[test]
    fn test_invalid_glob_is_false() {
        assert!(ConditionEvaluator::glob_match("[unclosed", "x").is_err());
        assert!(!eval(&leaf(LeafKind::Glob, "tool_input.path", "[unclosed"), &RuleSet::default()));
    }

    #[test]
    fn test_equals_operators() {
        let ruleset = RuleSet::default();
        assert!(eval(&equals("tool_name", StringOperator::Equals, "Bash"), &ruleset));
        assert!(eval(&equals("tool_input.command", StringOperator::StartsWith, "rm"), &ruleset));
        assert!(eval(&equals("tool_input.command", StringOperator::EndsWith, "build"), &ruleset));
        assert!(eval(&equals("tool_input.command", StringOperator::Contains, "-rf"), &ruleset));
        assert!(!eval(&equals("tool_name", StringOperator::Unsupported, "Bash"), &ruleset));
    }

    #[test]
    fn test_equals_stringifies_non_strings() {
        let ruleset = RuleSet::default();
        assert!(eval(&equals("tool_input.count", StringOperator::Equals, "3"), &ruleset));
        assert!(eval(&equals("tool_input.nested.flag", StringOperator::Equals, "true"), &ruleset));
    }

    #[test]
    fn test_exists() {
        let ruleset = RuleSet::default();
        assert!(eval(&leaf(LeafKind::Exists, "tool_input.path", ""), &ruleset));
        assert!(!eval(&leaf(LeafKind::Exists, "tool_input.missing", ""), &ruleset));
        assert!(!eval(&leaf(LeafKind::Exists, "tool_input.path.deeper", ""), &ruleset));
    }

    #[test]
    fn test_missing_field_is_false_for_every_kind() {
        let ruleset = RuleSet::default();
        for kind in [LeafKind::Regex, LeafKind::Glob, LeafKind::Equals, LeafKind::Exists] {
            assert!(!eval(&leaf(kind, "tool_input.absent", ".*"), &ruleset));
        }
    }

    #[test]
    fn test_compound_conditions() {
        let ruleset = RuleSet::default();
        let yes = leaf(LeafKind::Exists, "tool_name", "");
        let no = leaf(LeafKind::Exists, "missing", "");

        assert!(eval(&Condition::All(vec![]), &ruleset));
        assert!(!eval(&Condition::Any(vec![]), &ruleset));
        assert!(eval(&Condition::All(vec![yes.clone(), yes.clone()]), &ruleset));
        assert!(!eval(&Condition::All(vec![yes.clone(), no.clone()]), &ruleset));
        assert!(eval(&Condition::Any(vec![no.clone(), yes.clone()]), &ruleset));
        assert!(!eval(&Condition::Any(vec![no.clone(), no.clone()]), &ruleset));
        assert!(eval(&Condition::Not(Box::new(no)), &ruleset));
        assert!(!eval(&Condition::Not(Box::new(yes)), &ruleset));
    }

    #[test]
    fn test_reference_with_override() {
        let ruleset = RuleSet::default()
            .with_condition("is_env_file", leaf(LeafKind::Glob, "tool_input.file_path", "*.env"));

        let reference = Condition::Ref(ConditionRef {
            name: "is_env_file".to_string(),
            overrides: ConditionOverrides {
                field: Some("tool_input.path".to_string()),
                ..Default::default()
            },
        });
        assert!(eval(&reference, &ruleset));

        let without_override = Condition::Ref(ConditionRef {
            name: "is_env_file".to_string(),
            overrides: ConditionOverrides::default(),
        });
        assert!(!eval(&without_override, &ruleset));
    }

    #[test]
    fn test_missing_reference_is_false() {
        let reference = Condition::Ref(ConditionRef {
            name: "nonexistent".to_string(),
            overrides: ConditionOverrides::default(),
        });
        assert!(!eval(&reference, &RuleSet::default()));
        assert!(eval(&Condition::Not(Box::new(reference)), &RuleSet::default()));
    }

    #[test]
    fn test_cyclic_reference_fails_closed() {
        let cycle = |name: &str| {
            Condition::Ref(ConditionRef {
                name: name.to_string(),
                overrides: ConditionOverrides::default(),
            })
        };
        let ruleset = RuleSet::default()
            .with_condition("a", cycle("b"))
            .with_condition("b", Condition::Not(Box::new(cycle("a"))));

        assert!(!eval(&cycle("a"), &ruleset));
        assert!(!eval(&Condition::Not(Box::new(cycle("a"))), &ruleset));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/etc/passwd"), "passwd");
        assert_eq!(base_name("passwd"), "passwd");
        assert_eq!(base_name("/etc/"), "etc");
        assert_eq!(base_name("/"), "/");
        assert_eq!(base_name(""), ".");
    }
}
