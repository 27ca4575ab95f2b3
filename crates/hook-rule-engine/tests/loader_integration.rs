//! 分层配置加载集成测试

use std::fs;
use std::path::Path;

use rule_engine::loader::{ACTIONS_FILE, CONDITIONS_FILE, HOOKS_FILE, RULES_FILE};
use rule_engine::{
    Dispatcher, Event, JsonlFileSink, NullSink, PermissionDecision, RuleSetLoader,
};
use rule_engine::sink::EventRecord;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// 用户级和项目级两层配置
fn create_layers() -> (TempDir, TempDir) {
    let user = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    write(
        user.path(),
        CONDITIONS_FILE,
        r#"
conditions:
  is_secret:
    type: glob
    field: tool_input.file_path
    pattern: "*.env"
  is_shell:
    type: equals
    field: tool_name
    value: Bash
"#,
    );
    write(
        user.path(),
        ACTIONS_FILE,
        r#"
actions:
  deny_secret:
    type: decision
    decision: deny
    message: "user layer: {{file_path}}"
"#,
    );
    write(
        user.path(),
        RULES_FILE,
        r#"
rules:
  - id: secrets
    enabled: true
    priority: 50
    trigger: {event: pre_tool, matcher: "Write|Edit"}
    conditions: {ref: is_secret}
    actions:
      - ref: deny_secret
"#,
    );

    // 项目层覆盖同名条件和动作，并追加规则
    write(
        project.path(),
        CONDITIONS_FILE,
        r#"
conditions:
  is_secret:
    type: glob
    field: tool_input.file_path
    pattern: "*.pem"
"#,
    );
    write(
        project.path(),
        ACTIONS_FILE,
        r#"
actions:
  deny_secret:
    type: decision
    decision: deny
    message: "project layer: {{file_path}}"
"#,
    );
    write(
        project.path(),
        HOOKS_FILE,
        r#"
rules:
  - id: audit
    enabled: true
    priority: 100
    actions:
      - type: log
"#,
    );

    (user, project)
}

fn write_event(tool: &str, file_path: &str) -> Event {
    Event::from_json(&format!(
        r#"{{"hook_type":"pre_tool","tool_name":"{}","tool_input":{{"file_path":"{}"}},"session_id":"s1"}}"#,
        tool, file_path
    ))
    .unwrap()
}

// ==================== 合并顺序测试 ====================

#[test]
fn test_later_layers_override_registries() {
    let (user, project) = create_layers();
    let report =
        RuleSetLoader::new(vec![user.path().to_path_buf(), project.path().to_path_buf()]).load();
    let ruleset = &report.ruleset;

    assert_eq!(ruleset.conditions.len(), 2);
    assert_eq!(ruleset.actions.len(), 1);
    let ids: Vec<_> = ruleset.rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["secrets", "audit"]);

    let dispatcher = Dispatcher::new(&NullSink);
    let verdict = dispatcher.dispatch(&write_event("Write", "certs/server.pem"), ruleset);
    assert_eq!(verdict.decision, Some(PermissionDecision::Deny));
    assert_eq!(verdict.message.as_deref(), Some("project layer: certs/server.pem"));

    // 用户层的 *.env 定义已被覆盖
    let verdict = dispatcher.dispatch(&write_event("Write", ".env"), ruleset);
    assert!(verdict.decision.is_none());
}

#[test]
fn test_layer_order_reversed() {
    let (user, project) = create_layers();
    let report =
        RuleSetLoader::new(vec![project.path().to_path_buf(), user.path().to_path_buf()]).load();

    let verdict = Dispatcher::new(&NullSink).dispatch(&write_event("Edit", "app/.env"), &report.ruleset);
    assert_eq!(verdict.message.as_deref(), Some("user layer: app/.env"));
}

#[test]
fn test_sources_reported() {
    let (user, project) = create_layers();
    let missing = user.path().join("does-not-exist");
    let report = RuleSetLoader::new(vec![
        user.path().to_path_buf(),
        missing,
        project.path().to_path_buf(),
    ])
    .load();

    assert_eq!(report.sources.len(), 3);
    assert_eq!(report.sources[0].files.len(), 3);
    assert!(!report.sources[1].exists);
    assert_eq!(report.sources[2].files.len(), 3);
    assert_eq!(report.failed_files().count(), 0);
}

// ==================== 事件日志测试 ====================

#[test]
fn test_log_action_writes_jsonl() {
    let (user, project) = create_layers();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("logs/hooks.jsonl");

    let report =
        RuleSetLoader::new(vec![user.path().to_path_buf(), project.path().to_path_buf()]).load();
    let sink = JsonlFileSink::new(&log_path);
    let dispatcher = Dispatcher::new(&sink);

    dispatcher.dispatch(&write_event("Read", "README.md"), &report.ruleset);
    dispatcher.dispatch(&write_event("Write", "key.pem"), &report.ruleset);

    let lines: Vec<EventRecord> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].tool_name, "Read");
    assert_eq!(lines[1].tool_name, "Write");
    assert_eq!(lines[1].event_type, "pre_tool");
    assert_eq!(lines[1].session_id, "s1");
}
