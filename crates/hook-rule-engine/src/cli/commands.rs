//! CLI 命令定义

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hook 规则引擎命令行工具
///
/// 规则从默认搜索目录加载（~/.claude-hooks、~/.claude、$CLAUDE_PROJECT_DIR/.claude），
/// `--config-dir` 指定的目录追加在最后，优先级最高。
#[derive(Parser, Debug)]
#[command(name = "hookctl")]
#[command(version, about = "Hook 规则引擎命令行工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，RUST_LOG 优先
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// 额外的规则目录，可重复指定
    #[arg(short = 'C', long = "config-dir", global = true)]
    pub config_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 列出所有启用的规则
    List,

    /// 用事件文件测试规则匹配
    ///
    /// 输出评估追踪和最终判定，进程退出码与判定一致。
    Test {
        /// 事件 JSON 文件
        event_file: PathBuf,

        /// 不写事件日志
        #[arg(long)]
        dry_run: bool,
    },

    /// 配置相关命令
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// 查看配置来源与合并结果
    Show,
    /// 校验配置，存在错误时退出码为 1
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::parse_from(["hookctl", "list"]);
        assert!(matches!(cli.command, Commands::List));
        assert!(cli.log_level.is_none());
        assert!(cli.config_dirs.is_empty());
    }

    #[test]
    fn test_cli_parse_test() {
        let cli = Cli::parse_from(["hookctl", "test", "event.json", "--dry-run"]);
        match cli.command {
            Commands::Test {
                event_file,
                dry_run,
            } => {
                assert_eq!(event_file, PathBuf::from("event.json"));
                assert!(dry_run);
            }
            _ => panic!("预期 Test 命令"),
        }
    }

    #[test]
    fn test_cli_parse_config() {
        let cli = Cli::parse_from(["hookctl", "config", "validate", "-C", "/a", "-C", "/b"]);
        match cli.command {
            Commands::Config { command } => assert_eq!(command, ConfigCommands::Validate),
            _ => panic!("预期 Config 命令"),
        }
        assert_eq!(cli.config_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["hookctl"]).is_err());
        assert!(Cli::try_parse_from(["hookctl", "config"]).is_err());
        assert!(Cli::try_parse_from(["hookctl", "test"]).is_err());
    }
}
