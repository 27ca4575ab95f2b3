//! 共享库
//!
//! 包含 hook 分发器与 hookctl 共用的配置加载和可观测性初始化代码。

pub mod config;
pub mod observability;
