//! 规则引擎领域模型
//!
//! 条件与动作在内存中是带标签的枚举；配置文件中则是扁平的 YAML 结构
//! （`ConditionSpec` / `ActionSpec`），反序列化时按字段存在与否转换成对应的变体。

use crate::error::Result;
use crate::operators::{DecisionKind, LeafKind, PermissionDecision, StringOperator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// 动作参数
pub type Params = Map<String, Value>;

/// 字段值转字符串：字符串原样输出，其余类型输出紧凑 JSON
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ==================== 事件 ====================

/// 宿主发送的原始 hook 负载
///
/// 字符串字段允许为 null 或缺失；`hook_event_name` 只在没有 `hook_type` 时使用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub hook_type: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Map<String, Value>>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// 其余顶层字段（如 cwd、transcript_path），同样可以按路径访问
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 一次工具调用事件
///
/// 构造完成后不再修改；`fields` 是按点号路径查询的字段树。
#[derive(Debug, Clone)]
pub struct Event {
    hook_type: String,
    tool_name: String,
    tool_input: Map<String, Value>,
    session_id: String,
    fields: Value,
}

impl Event {
    pub fn new(
        hook_type: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: Map<String, Value>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::from_payload(HookPayload {
            hook_type: Some(hook_type.into()),
            tool_name: Some(tool_name.into()),
            tool_input: Some(tool_input),
            session_id: Some(session_id.into()),
            ..Default::default()
        })
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: HookPayload = serde_json::from_str(json)?;
        Ok(Self::from_payload(payload))
    }

    pub fn from_payload(payload: HookPayload) -> Self {
        let HookPayload {
            hook_type,
            hook_event_name,
            tool_name,
            tool_input,
            session_id,
            extra,
        } = payload;
        let mut fields = extra;
        if let Some(name) = &hook_event_name {
            fields.insert("hook_event_name".to_string(), Value::String(name.clone()));
        }

        let hook_type = hook_type
            .filter(|s| !s.is_empty())
            .or(hook_event_name)
            .unwrap_or_default();
        let tool_name = tool_name.unwrap_or_default();
        let session_id = session_id.unwrap_or_default();
        let tool_input = tool_input.unwrap_or_default();

        fields.insert("hook_type".to_string(), Value::String(hook_type.clone()));
        fields.insert("tool_name".to_string(), Value::String(tool_name.clone()));
        fields.insert("session_id".to_string(), Value::String(session_id.clone()));
        fields.insert("tool_input".to_string(), Value::Object(tool_input.clone()));

        Self {
            hook_type,
            tool_name,
            tool_input,
            session_id,
            fields: Value::Object(fields),
        }
    }

    /// 用环境变量等外部来源覆盖 hook 类型
    pub fn with_hook_type(mut self, hook_type: impl Into<String>) -> Self {
        let hook_type = hook_type.into();
        if let Value::Object(map) = &mut self.fields {
            map.insert("hook_type".to_string(), Value::String(hook_type.clone()));
        }
        self.hook_type = hook_type;
        self
    }

    pub fn hook_type(&self) -> &str {
        &self.hook_type
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tool_input(&self) -> &Map<String, Value> {
        &self.tool_input
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 获取字段值（点号分隔的路径，如 "tool_input.path"）
    ///
    /// 中间节点不是对象、字段缺失或值为 null 时返回 None。
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }

        let mut current = &self.fields;
        for part in path.split('.') {
            match current {
                Value::Object(map) => current = map.get(part)?,
                _ => return None,
            }
        }

        if current.is_null() { None } else { Some(current) }
    }
}

// ==================== 条件 ====================

/// 条件表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionSpec", into = "ConditionSpec")]
pub enum Condition {
    /// 针对单个字段的匹配
    Leaf(LeafCondition),
    /// 全部子条件为真（空列表为真）
    All(Vec<Condition>),
    /// 任一子条件为真（空列表为假）
    Any(Vec<Condition>),
    /// 子条件取反
    Not(Box<Condition>),
    /// 引用条件注册表中的命名条件
    Ref(ConditionRef),
}

/// 叶子条件
#[derive(Debug, Clone, PartialEq)]
pub struct LeafCondition {
    pub kind: LeafKind,
    pub field: String,
    pub pattern: String,
    pub value: String,
    pub operator: StringOperator,
    pub ignore_case: bool,
}

impl LeafCondition {
    pub fn new(kind: LeafKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            pattern: String::new(),
            value: String::new(),
            operator: StringOperator::default(),
            ignore_case: false,
        }
    }
}

/// 条件引用及字段覆盖
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionRef {
    pub name: String,
    pub overrides: ConditionOverrides,
}

/// 引用时的字段覆盖，`None` 表示沿用被引用定义的值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionOverrides {
    pub kind: Option<LeafKind>,
    pub field: Option<String>,
    pub pattern: Option<String>,
    pub value: Option<String>,
    pub operator: Option<StringOperator>,
    pub ignore_case: Option<bool>,
}

impl ConditionOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 把覆盖字段合并到被引用的定义上
    ///
    /// 叶子条件逐字段覆盖；引用链上外层覆盖优先；组合条件不受叶子字段影响。
    pub fn apply_to(&self, base: &Condition) -> Condition {
        match base {
            Condition::Leaf(leaf) => {
                let mut merged = leaf.clone();
                if let Some(kind) = self.kind {
                    merged.kind = kind;
                }
                if let Some(field) = &self.field {
                    merged.field = field.clone();
                }
                if let Some(pattern) = &self.pattern {
                    merged.pattern = pattern.clone();
                }
                if let Some(value) = &self.value {
                    merged.value = value.clone();
                }
                if let Some(operator) = self.operator {
                    merged.operator = operator;
                }
                if let Some(ignore_case) = self.ignore_case {
                    merged.ignore_case = ignore_case;
                }
                Condition::Leaf(merged)
            }
            Condition::Ref(inner) => Condition::Ref(ConditionRef {
                name: inner.name.clone(),
                overrides: ConditionOverrides {
                    kind: self.kind.or(inner.overrides.kind),
                    field: self.field.clone().or_else(|| inner.overrides.field.clone()),
                    pattern: self.pattern.clone().or_else(|| inner.overrides.pattern.clone()),
                    value: self.value.clone().or_else(|| inner.overrides.value.clone()),
                    operator: self.operator.or(inner.overrides.operator),
                    ignore_case: self.ignore_case.or(inner.overrides.ignore_case),
                },
            }),
            compound => compound.clone(),
        }
    }
}

/// 配置文件中的条件结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<LeafKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<StringOperator>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<Vec<Condition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any: Option<Vec<Condition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Condition>>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

const FLAG_IGNORE_CASE: &str = "ignorecase";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// 把数字、布尔等标量统一读成字符串
fn deserialize_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(other) => Some(stringify(&other)),
    })
}

impl From<ConditionSpec> for Condition {
    fn from(spec: ConditionSpec) -> Self {
        let ignore_case = if spec.flags.is_empty() {
            None
        } else {
            Some(
                spec.flags
                    .iter()
                    .any(|flag| flag.eq_ignore_ascii_case(FLAG_IGNORE_CASE)),
            )
        };

        if let Some(name) = non_empty(spec.reference) {
            return Condition::Ref(ConditionRef {
                name,
                overrides: ConditionOverrides {
                    kind: spec.kind,
                    field: non_empty(spec.field),
                    pattern: non_empty(spec.pattern),
                    value: non_empty(spec.value),
                    operator: spec.operator,
                    ignore_case,
                },
            });
        }

        if let Some(children) = spec.all {
            return Condition::All(children);
        }
        if let Some(children) = spec.any {
            return Condition::Any(children);
        }
        if let Some(child) = spec.not {
            return Condition::Not(child);
        }

        Condition::Leaf(LeafCondition {
            kind: spec.kind.unwrap_or(LeafKind::Unsupported),
            field: spec.field.unwrap_or_default(),
            pattern: spec.pattern.unwrap_or_default(),
            value: spec.value.unwrap_or_default(),
            operator: spec.operator.unwrap_or_default(),
            ignore_case: ignore_case.unwrap_or(false),
        })
    }
}

impl From<Condition> for ConditionSpec {
    fn from(condition: Condition) -> Self {
        let flags = |ignore_case: Option<bool>| {
            if ignore_case == Some(true) {
                vec![FLAG_IGNORE_CASE.to_string()]
            } else {
                Vec::new()
            }
        };

        match condition {
            Condition::Leaf(leaf) => ConditionSpec {
                kind: Some(leaf.kind),
                field: Some(leaf.field),
                pattern: non_empty(Some(leaf.pattern)),
                value: non_empty(Some(leaf.value)),
                operator: (leaf.operator != StringOperator::default()).then_some(leaf.operator),
                flags: flags(Some(leaf.ignore_case)),
                ..Default::default()
            },
            Condition::All(children) => ConditionSpec {
                all: Some(children),
                ..Default::default()
            },
            Condition::Any(children) => ConditionSpec {
                any: Some(children),
                ..Default::default()
            },
            Condition::Not(child) => ConditionSpec {
                not: Some(child),
                ..Default::default()
            },
            Condition::Ref(reference) => ConditionSpec {
                reference: Some(reference.name),
                kind: reference.overrides.kind,
                field: reference.overrides.field,
                pattern: reference.overrides.pattern,
                value: reference.overrides.value,
                operator: reference.overrides.operator,
                flags: flags(reference.overrides.ignore_case),
                ..Default::default()
            },
        }
    }
}

// ==================== 动作 ====================

/// 动作表达式，每种动作都可以携带参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ActionSpec", into = "ActionSpec")]
pub struct Action {
    pub kind: ActionKind,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// 终止性决策，消息支持 `{{key}}` 模板
    Decision {
        decision: DecisionKind,
        message: String,
    },
    /// 写事件日志，永远不终止分发
    Log,
    /// 依次执行子动作，第一个终止结果生效
    Chain(Vec<Action>),
    /// 条件分支
    Conditional {
        condition: Option<Condition>,
        then: Option<Box<Action>>,
        otherwise: Option<Box<Action>>,
    },
    /// 引用动作注册表中的命名动作
    Ref(String),
    /// 无法识别的类型（如 script），执行时为空操作
    Unsupported(String),
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: Params::new(),
        }
    }

    pub fn decision(decision: DecisionKind, message: impl Into<String>) -> Self {
        Self::new(ActionKind::Decision {
            decision,
            message: message.into(),
        })
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// 配置文件中的动作结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<Action>>,
    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Box<Action>>,
}

impl From<ActionSpec> for Action {
    fn from(spec: ActionSpec) -> Self {
        let kind = if let Some(name) = non_empty(spec.reference) {
            ActionKind::Ref(name)
        } else {
            match spec.kind.as_deref().unwrap_or_default() {
                "decision" => ActionKind::Decision {
                    decision: spec.decision.unwrap_or_default(),
                    message: spec.message.unwrap_or_default(),
                },
                "log" => ActionKind::Log,
                "chain" => ActionKind::Chain(spec.actions),
                "conditional" => ActionKind::Conditional {
                    condition: spec.condition,
                    then: spec.then,
                    otherwise: spec.otherwise,
                },
                other => ActionKind::Unsupported(other.to_string()),
            }
        };

        Action {
            kind,
            params: spec.params,
        }
    }
}

impl From<Action> for ActionSpec {
    fn from(action: Action) -> Self {
        let mut spec = ActionSpec {
            params: action.params,
            ..Default::default()
        };

        match action.kind {
            ActionKind::Decision { decision, message } => {
                spec.kind = Some("decision".to_string());
                spec.decision = Some(decision);
                spec.message = non_empty(Some(message));
            }
            ActionKind::Log => spec.kind = Some("log".to_string()),
            ActionKind::Chain(actions) => {
                spec.kind = Some("chain".to_string());
                spec.actions = actions;
            }
            ActionKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                spec.kind = Some("conditional".to_string());
                spec.condition = condition;
                spec.then = then;
                spec.otherwise = otherwise;
            }
            ActionKind::Ref(name) => spec.reference = Some(name),
            ActionKind::Unsupported(kind) => spec.kind = non_empty(Some(kind)),
        }

        spec
    }
}

// ==================== 规则 ====================

/// 规则触发器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    /// 事件类型，空表示任意事件
    pub event: String,
    /// 工具名正则，空表示任意工具
    pub matcher: String,
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default, alias = "condition", skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(id: impl Into<String>, priority: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            enabled: true,
            priority,
            tags: Vec::new(),
            trigger: Trigger::default(),
            conditions: None,
            actions: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, event: impl Into<String>, matcher: impl Into<String>) -> Self {
        self.trigger = Trigger {
            event: event.into(),
            matcher: matcher.into(),
        };
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions = Some(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// 一次分发使用的完整规则集
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub conditions: HashMap<String, Condition>,
    #[serde(default)]
    pub actions: HashMap<String, Action>,
    #[serde(skip)]
    pub scripts_dir: Option<PathBuf>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(name.into(), condition);
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, action: Action) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// 按名称查找命名条件
    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.get(name)
    }

    /// 按名称查找命名动作
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }
}

// ==================== 判定结果 ====================

/// 一次分发的唯一输出
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub exit_code: i32,
    pub decision: Option<PermissionDecision>,
    pub message: Option<String>,
}

impl Verdict {
    /// 退出码 2 表示阻断
    pub const EXIT_BLOCK: i32 = 2;

    /// 默认结果：继续执行，不发表意见
    pub fn continue_normally() -> Self {
        Self::default()
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            exit_code: Self::EXIT_BLOCK,
            decision: Some(PermissionDecision::Deny),
            message: non_empty(Some(message.into())),
        }
    }

    pub fn allow() -> Self {
        Self {
            exit_code: 0,
            decision: Some(PermissionDecision::Allow),
            message: None,
        }
    }

    pub fn ask(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            decision: Some(PermissionDecision::Ask),
            message: non_empty(Some(message.into())),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.exit_code == Self::EXIT_BLOCK
    }

    /// 宿主协议的 stdout 输出，没有决策时不输出任何内容
    pub fn hook_output(&self) -> Option<HookOutput> {
        self.decision.map(|decision| HookOutput {
            permission_decision: decision,
            message: self.message.clone(),
        })
    }
}

/// 写给宿主的 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub permission_decision: PermissionDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
