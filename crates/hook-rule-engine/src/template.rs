//! 消息模板渲染
//!
//! 决策消息中的 `{{key}}` 占位符由事件字段和动作参数填充。
//! 上下文依次写入 tool_name、session_id、tool_input 的各个键，最后用动作参数覆盖同名键。
//! 替换值本身可能包含占位符，因此最多迭代三轮，某一轮没有发生替换即停止。

use crate::models::{Event, Params, stringify};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// 最大替换轮数
const MAX_PASSES: usize = 3;

/// 匹配 {{key}} 格式的占位符
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+?)\}\}").expect("占位符正则必须合法"));

/// 模板渲染上下文
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, String>,
}

impl TemplateContext {
    /// 由事件和动作参数构建上下文
    pub fn from_event(event: &Event, params: &Params) -> Self {
        let mut values = HashMap::new();
        values.insert("tool_name".to_string(), event.tool_name().to_string());
        values.insert("session_id".to_string(), event.session_id().to_string());

        for (key, value) in event.tool_input() {
            values.insert(key.clone(), stringify(value));
        }
        for (key, value) in params {
            values.insert(key.clone(), stringify(value));
        }

        Self { values }
    }

    /// 渲染模板，未知占位符原样保留
    pub fn render(&self, template: &str) -> String {
        let mut result = template.to_string();

        for _ in 0..MAX_PASSES {
            if !result.contains("{{") {
                break;
            }

            let mut substituted = false;
            let next = PLACEHOLDER
                .replace_all(&result, |caps: &Captures| match self.values.get(&caps[1]) {
                    Some(value) => {
                        substituted = true;
                        value.clone()
                    }
                    None => caps[0].to_string(),
                })
                .into_owned();

            if !substituted {
                break;
            }
            result = next;
        }

        result
    }
}

/// 用事件和参数渲染一条消息
pub fn render_message(template: &str, event: &Event, params: &Params) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    TemplateContext::from_event(event, params).render(template)
}
