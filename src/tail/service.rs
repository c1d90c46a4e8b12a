//! Tail 服务
//!
//! 同一时刻只持有一个 [`TailSession`]。路径在每次 start 时重新从配置解析。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{TailObserver, TailSession};
use crate::config::{display_name, LogPathSource, ServerConfig};
use crate::error::{Error, Result};
use crate::protocol::{file_not_found_message, read_failed_message, watch_failed_message};

/// Tail 生命周期管理
pub struct TailService {
    /// 路径来源
    source: LogPathSource,
    /// 定时检查间隔
    update_interval: Duration,
    /// 事件观察者
    observer: Arc<dyn TailObserver>,
    /// 当前会话
    session: Mutex<Option<TailSession>>,
    /// 当前（或最近一次）绑定的路径
    last_path: Mutex<Option<PathBuf>>,
}

impl TailService {
    pub fn new(
        source: LogPathSource,
        update_interval: Duration,
        observer: Arc<dyn TailObserver>,
    ) -> Self {
        Self {
            source,
            update_interval,
            observer,
            session: Mutex::new(None),
            last_path: Mutex::new(None),
        }
    }

    /// 从服务配置创建
    pub fn from_config(config: &ServerConfig, observer: Arc<dyn TailObserver>) -> Self {
        Self::new(config.log_path.clone(), config.update_interval, observer)
    }

    /// 启动监控，已有会话时先停止
    ///
    /// 失败时同时通过观察者发出一条错误提示，返回解析后的绝对路径。
    pub fn start(&self) -> Result<PathBuf> {
        let mut session = self.session.lock();
        if let Some(mut old) = session.take() {
            old.stop();
            tracing::info!("已停止日志监控: {:?}", old.path());
        }

        let path = self.source.resolve();
        *self.last_path.lock() = Some(path.clone());

        match TailSession::start(&path, self.update_interval, self.observer.clone()) {
            Ok(new_session) => {
                let resolved = new_session.path().to_path_buf();
                *self.last_path.lock() = Some(resolved.clone());
                *session = Some(new_session);
                Ok(resolved)
            }
            Err(e) => {
                tracing::error!("❌ 启动日志监控失败: {}", e);
                let message = match &e {
                    Error::FileNotFound(p) => file_not_found_message(&display_name(p)),
                    Error::WatcherSetup(err) => watch_failed_message(&err.to_string()),
                    other => read_failed_message(&other.to_string()),
                };
                self.observer.on_tail_error(&message);
                Err(e)
            }
        }
    }

    /// 停止监控，返回是否确有会话被停止
    pub fn stop(&self) -> bool {
        match self.session.lock().take() {
            Some(mut session) => {
                session.stop();
                tracing::info!("已停止日志监控: {:?}", session.path());
                true
            }
            None => false,
        }
    }

    /// 停止后按当前配置重新启动
    pub fn restart(&self) -> Result<PathBuf> {
        self.stop();
        self.start()
    }

    /// 当前（或最近一次）绑定的路径；从未启动时返回配置路径
    pub fn current_path(&self) -> PathBuf {
        self.last_path
            .lock()
            .clone()
            .unwrap_or_else(|| self.source.resolve())
    }

    /// 对外展示用的文件名
    pub fn display_name(&self) -> String {
        display_name(&self.current_path())
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// 活跃会话的偏移量
    pub fn offset(&self) -> Option<u64> {
        self.session.lock().as_ref().map(|s| s.offset())
    }

    /// 请求活跃会话立即 check 一次
    pub fn trigger(&self) {
        if let Some(session) = self.session.lock().as_ref() {
            session.trigger();
        }
    }
}
