//! hookctl 命令行模块
//!
//! - `list` - 列出启用的规则
//! - `test` - 用事件文件测试规则匹配
//! - `config show` - 查看配置来源
//! - `config validate` - 校验配置
//!
//! # 使用示例
//!
//! ```bash
//! hookctl list
//! hookctl test event.json --dry-run
//! hookctl -C ./fixtures config validate
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands, ConfigCommands};
pub use runner::CommandRunner;
