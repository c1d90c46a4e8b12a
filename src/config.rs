//! 服务配置
//!
//! 默认值与环境变量覆盖。日志文件路径通过 [`LogPathSource`] 在每次
//! start / restart 时重新解析，不做缓存。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// 日志文件路径的环境变量
pub const LOG_FILE_PATH_ENV: &str = "LOG_FILE_PATH";

/// 日志文件路径来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPathSource {
    /// 固定路径
    Fixed(PathBuf),
    /// 每次解析时读取环境变量，未设置时使用默认路径
    Env { var: String, default: PathBuf },
}

impl LogPathSource {
    /// 解析当前配置的日志文件路径
    pub fn resolve(&self) -> PathBuf {
        match self {
            LogPathSource::Fixed(path) => path.clone(),
            LogPathSource::Env { var, default } => std::env::var_os(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| default.clone()),
        }
    }
}

impl Default for LogPathSource {
    fn default() -> Self {
        LogPathSource::Env {
            var: LOG_FILE_PATH_ENV.to_string(),
            default: PathBuf::from("test.log"),
        }
    }
}

/// 服务配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 日志文件路径来源
    pub log_path: LogPathSource,
    /// WebSocket 端口
    pub ws_port: u16,
    /// HTTP 端口
    pub http_port: u16,
    /// 定时检查间隔
    pub update_interval: Duration,
    /// 前端最大显示行数（仅透传给前端）
    pub max_lines: usize,
    /// 静态资源目录
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_path: LogPathSource::default(),
            ws_port: 8080,
            http_port: 3000,
            update_interval: Duration::from_millis(1000),
            max_lines: 1000,
            public_dir: PathBuf::from("public"),
        }
    }
}

impl ServerConfig {
    /// 使用固定日志路径创建配置
    pub fn with_log_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            log_path: LogPathSource::Fixed(path.into()),
            ..Self::default()
        }
    }

    /// 从环境变量创建配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源创建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "REALLOG_WS_PORT")? {
            config.ws_port = port;
        }
        if let Some(port) = parse_var(&lookup, "REALLOG_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "REALLOG_UPDATE_INTERVAL_MS")? {
            if ms == 0 {
                return Err(Error::Config(
                    "REALLOG_UPDATE_INTERVAL_MS 必须大于 0".to_string(),
                ));
            }
            config.update_interval = Duration::from_millis(ms);
        }
        if let Some(lines) = parse_var(&lookup, "REALLOG_MAX_LINES")? {
            config.max_lines = lines;
        }
        if let Some(dir) = lookup("REALLOG_PUBLIC_DIR").filter(|v| !v.is_empty()) {
            config.public_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

/// 取路径的文件名部分，用于对外展示（不暴露本地目录结构）
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw}: {e}"))),
    }
}
