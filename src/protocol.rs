//! 对外协议定义
//!
//! - WebSocket: 纯 UTF-8 文本帧（欢迎消息 / 提示行 / 原样日志内容）
//! - HTTP: `/api/restart`、`/api/config` 的 JSON 响应体

use serde::{Deserialize, Serialize};

/// 截断提示（作为普通文本行推送给查看者）
pub const TRUNCATION_NOTICE: &str = "警告: 日志文件被截断，重新从头读取\n";

/// 连接建立后的欢迎消息，只包含文件名
pub fn welcome_message(file_name: &str) -> String {
    format!("已连接到日志服务器，正在监控: {}\n", file_name)
}

/// 日志文件不存在
pub fn file_not_found_message(file_name: &str) -> String {
    format!("错误: 日志文件不存在 ({})\n", file_name)
}

/// 文件监听注册失败
pub fn watch_failed_message(reason: &str) -> String {
    format!("错误: 监控日志文件失败 ({})\n", reason)
}

/// 读取失败（stat / read）
pub fn read_failed_message(reason: &str) -> String {
    format!("错误: 读取日志文件失败 ({})\n", reason)
}

/// `POST /api/restart` 响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartResponse {
    pub success: bool,
    pub message: String,
}

impl RestartResponse {
    /// 重启成功，`file_name` 为正在监控的文件名
    pub fn restarted(file_name: &str) -> Self {
        Self {
            success: true,
            message: format!("已重新启动日志监控: {}", file_name),
        }
    }

    /// 重启失败
    pub fn failed() -> Self {
        Self {
            success: false,
            message: "重启日志监控失败".to_string(),
        }
    }
}

/// `GET /api/config` 响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// 文件名（不含目录）
    pub log_file_path: String,
    pub max_lines: usize,
}
