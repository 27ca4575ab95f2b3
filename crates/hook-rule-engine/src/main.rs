//! Hook 分发器
//!
//! 从 stdin 读取事件，按规则分发后把判定写到 stdout，并以判定的退出码退出。
//! 任何失败（配置、事件解析、panic）都放行：不输出判定，退出码 0。

use std::io::{self, Read, Write};
use std::panic;
use std::process::ExitCode;

use anyhow::{Context, Result};
use hook_shared::config::EngineConfig;
use hook_shared::observability;
use rule_engine::{Dispatcher, Event, JsonlFileSink, RuleSetLoader, Verdict};
use tracing::{debug, warn};

fn main() -> ExitCode {
    let verdict = match panic::catch_unwind(run) {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            warn!(error = %e, "分发失败，放行");
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            eprintln!("hook 引擎 panic，放行");
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = emit(&verdict) {
        eprintln!("判定输出失败: {}", e);
        return ExitCode::SUCCESS;
    }

    ExitCode::from(u8::try_from(verdict.exit_code).unwrap_or(0))
}

fn run() -> Result<Verdict> {
    // 引擎配置加载失败不影响分发，使用默认值
    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("引擎配置加载失败，使用默认配置: {}", e);
        EngineConfig::default()
    });
    if let Err(e) = observability::init(&config.observability) {
        eprintln!("日志初始化失败: {}", e);
    }

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("读取 stdin 失败")?;
    let mut event = Event::from_json(&input).context("事件解析失败")?;
    if let Some(hook_type) = &config.hook_type_override {
        event = event.with_hook_type(hook_type.clone());
    }

    let report = RuleSetLoader::from_config(&config).load();
    let sink = JsonlFileSink::new(config.log_file_path());
    let verdict = Dispatcher::new(&sink).dispatch(&event, &report.ruleset);

    debug!(exit_code = verdict.exit_code, decision = ?verdict.decision, "分发完成");
    Ok(verdict)
}

/// 有决策时把宿主协议 JSON 写到 stdout
fn emit(verdict: &Verdict) -> Result<()> {
    let Some(output) = verdict.hook_output() else {
        return Ok(());
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &output)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
