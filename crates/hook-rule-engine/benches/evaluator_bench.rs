//! 条件评估器性能基准测试
//!
//! 针对各类叶子条件和组合条件的求值开销。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::models::{ConditionOverrides, ConditionRef, LeafCondition};
use rule_engine::{Condition, ConditionEvaluator, Event, LeafKind, RuleSet, StringOperator};
use serde_json::json;
use std::hint::black_box;

fn create_test_event() -> Event {
    Event::from_json(
        &json!({
            "hook_type": "pre_tool",
            "tool_name": "Bash",
            "session_id": "bench",
            "tool_input": {
                "command": "git push --force origin main",
                "path": "/home/dev/project/config/.env.production"
            }
        })
        .to_string(),
    )
    .expect("valid event")
}

fn leaf(kind: LeafKind, field: &str, pattern: &str) -> Condition {
    let mut leaf = LeafCondition::new(kind, field);
    leaf.pattern = pattern.to_string();
    leaf.value = pattern.to_string();
    leaf.operator = StringOperator::Contains;
    Condition::Leaf(leaf)
}

/// 叶子条件基准
fn bench_leaf_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_conditions");
    let event = create_test_event();
    let ruleset = RuleSet::default();

    let cases = [
        ("regex", leaf(LeafKind::Regex, "tool_input.command", r"push\s+--force")),
        ("glob_basename", leaf(LeafKind::Glob, "tool_input.path", "*.env*")),
        ("glob_full_path", leaf(LeafKind::Glob, "tool_input.path", "/home/**/.env*")),
        ("equals_contains", leaf(LeafKind::Equals, "tool_input.command", "--force")),
        ("exists", leaf(LeafKind::Exists, "tool_input.path", "")),
        ("missing_field", leaf(LeafKind::Regex, "tool_input.absent", ".*")),
    ];

    for (name, condition) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| {
                ConditionEvaluator::evaluate(
                    black_box(Some(condition)),
                    black_box(&event),
                    black_box(&ruleset),
                )
            })
        });
    }

    group.finish();
}

/// 组合条件基准（不同宽度的 all 组）
fn bench_compound_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("compound_conditions");
    let event = create_test_event();
    let ruleset = RuleSet::default();

    for width in [1, 5, 10, 20] {
        let condition = Condition::All(
            (0..width)
                .map(|_| leaf(LeafKind::Equals, "tool_name", "Ba"))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::new("all", width), &condition, |b, condition| {
            b.iter(|| ConditionEvaluator::evaluate(Some(black_box(condition)), &event, &ruleset))
        });
    }

    group.finish();
}

/// 引用链解析基准
fn bench_reference_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference_chain");
    let event = create_test_event();

    for depth in [1, 4, 16] {
        let mut ruleset = RuleSet::default()
            .with_condition("level_0", leaf(LeafKind::Glob, "tool_input.path", "*.env*"));
        for level in 1..depth {
            ruleset = ruleset.with_condition(
                format!("level_{}", level),
                Condition::Ref(ConditionRef {
                    name: format!("level_{}", level - 1),
                    overrides: ConditionOverrides::default(),
                }),
            );
        }
        let root = Condition::Ref(ConditionRef {
            name: format!("level_{}", depth - 1),
            overrides: ConditionOverrides::default(),
        });

        group.bench_with_input(BenchmarkId::new("depth", depth), &root, |b, root| {
            b.iter(|| ConditionEvaluator::evaluate(Some(black_box(root)), &event, &ruleset))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_leaf_conditions,
    bench_compound_conditions,
    bench_reference_chain
);
criterion_main!(benches);
