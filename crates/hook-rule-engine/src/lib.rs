//! Hook 规则引擎
//!
//! 针对工具调用事件的规则评估与分发，支持：
//! - 分层 YAML 规则、命名条件和命名动作
//! - regex / glob / 字符串比较 / 存在性条件及 all / any / not 组合
//! - decision / log / chain / conditional 动作与消息模板
//! - 按优先级分发，失败时放行

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod loader;
pub mod models;
pub mod operators;
pub mod sink;
pub mod template;
pub mod validator;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::ActionExecutor;
pub use loader::{LoadReport, RuleSetLoader};
pub use models::{Action, ActionKind, Condition, Event, Rule, RuleSet, Trigger, Verdict};
pub use operators::{DecisionKind, LeafKind, PermissionDecision, StringOperator};
pub use sink::{EventSink, JsonlFileSink, NullSink};
pub use validator::{ConfigValidator, ValidationReport};
