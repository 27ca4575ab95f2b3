//! hookctl
//!
//! 查看、测试和校验 hook 规则配置。

use std::io;
use std::process::ExitCode;

use clap::Parser;
use hook_shared::config::EngineConfig;
use hook_shared::observability;
use rule_engine::cli::{Cli, CommandRunner, Commands, ConfigCommands};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("引擎配置加载失败，使用默认配置: {}", e);
        EngineConfig::default()
    });
    config.search_paths.extend(cli.config_dirs.iter().cloned());

    let mut obs_config = config.observability.clone();
    if let Some(level) = &cli.log_level {
        obs_config = obs_config.with_log_level(level.clone());
    }
    observability::init(&obs_config)?;

    let runner = CommandRunner::new(config);
    let mut out = io::stdout().lock();

    let code = match cli.command {
        Commands::List => runner.run_list(&mut out)?,
        Commands::Test {
            event_file,
            dry_run,
        } => runner.run_test(&event_file, dry_run, &mut out)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => runner.run_config_show(&mut out)?,
            ConfigCommands::Validate => runner.run_config_validate(&mut out)?,
        },
    };

    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
