//! 错误类型定义

use std::path::PathBuf;

use thiserror::Error;

/// 库错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 日志文件不存在（start / restart 时）
    #[error("日志文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 文件监听注册失败
    #[error("监控日志文件失败: {0}")]
    WatcherSetup(#[from] notify::Error),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
