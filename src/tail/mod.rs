//! Tail 模块 - 日志文件增量读取
//!
//! - [`Tailer`]: 偏移量 / 截断 / 轮转检测，执行单次 check
//! - [`TailSession`]: 文件监听 + 定时器双触发，单飞执行 check
//! - [`TailService`]: start / stop / restart 生命周期

mod reader;
mod session;
mod service;

use tokio::sync::mpsc;

pub use reader::Tailer;
pub use session::{ChangeTrigger, TailSession};
pub use service::TailService;

/// 截断原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateReason {
    /// 文件变小
    Shrunk,
    /// 同名文件被替换（inode / file index 变化）
    Replaced,
}

/// 截断信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    /// 截断前的偏移量
    pub previous_offset: u64,
    pub reason: TruncateReason,
}

/// 一次 check 产生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// 新追加的内容（UTF-8 解码）
    ContentAppended { content: String },
    /// 检测到截断，偏移量已重置为 0
    Truncated(Truncation),
    /// 读取失败，偏移量保持不变
    TailError { message: String },
}

impl TailEvent {
    /// 投递给观察者
    pub fn dispatch(self, observer: &dyn TailObserver) {
        match self {
            TailEvent::ContentAppended { content } => observer.on_content_appended(&content),
            TailEvent::Truncated(truncation) => observer.on_truncated(truncation),
            TailEvent::TailError { message } => observer.on_tail_error(&message),
        }
    }
}

/// Tail 事件观察者，构造时绑定一次
pub trait TailObserver: Send + Sync + 'static {
    /// 文件新增内容
    fn on_content_appended(&self, content: &str);

    /// 读取 / 监听错误（文本已是面向查看者的提示）
    fn on_tail_error(&self, message: &str);

    /// 截断（默认忽略）
    fn on_truncated(&self, _truncation: Truncation) {}
}

impl TailObserver for mpsc::UnboundedSender<TailEvent> {
    fn on_content_appended(&self, content: &str) {
        let _ = self.send(TailEvent::ContentAppended {
            content: content.to_string(),
        });
    }

    fn on_tail_error(&self, message: &str) {
        let _ = self.send(TailEvent::TailError {
            message: message.to_string(),
        });
    }

    fn on_truncated(&self, truncation: Truncation) {
        let _ = self.send(TailEvent::Truncated(truncation));
    }
}
