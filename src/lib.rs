//! reallog - 实时日志服务
//!
//! 监控一个只追加的日志文件，把新写入的内容实时推送给所有已连接的查看者。
//!
//! # 核心功能
//!
//! - **增量读取**: 只推送启动后追加的内容，检测截断 / 轮转后从头重读
//! - **双路触发**: 文件监听 + 定时检查，单飞执行，重复触发自动合并
//! - **广播**: 连接注册 / 注销，单个连接失败不影响其他连接
//!
//! # Feature Flags
//!
//! - `server`: WebSocket 推送 + HTTP 控制接口（默认开启）
//!
//! # 架构
//!
//! 文件变化 / 定时器 → [`TailSession`] check → [`TailObserver`] →
//! [`BroadcastHub::broadcast`] → 每个 Open 连接

pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod protocol;
pub mod tail;

#[cfg(feature = "server")]
pub mod server;

// Re-exports
pub use config::{LogPathSource, ServerConfig};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, ConnId, ConnState, MessageSender};
pub use tail::{
    ChangeTrigger, TailEvent, TailObserver, TailService, TailSession, Tailer, TruncateReason,
    Truncation,
};

#[cfg(feature = "server")]
pub use server::{HubForwarder, LogServer};
