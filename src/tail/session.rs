//! Tail 会话
//!
//! 文件监听（notify）和定时器两路信号都只做一件事：向容量为 1 的唤醒通道
//! `try_send`。会话任务独占 [`Tailer`]，串行执行 check，因此同一时刻最多只有
//! 一次读取；check 进行中到达的多次触发合并为之后的一次 check。

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{Tailer, TailObserver};
use crate::error::Result;

/// 双路触发：文件监听 + 定时器
///
/// drop 时同时注销监听并取消定时器。
pub struct ChangeTrigger {
    watcher: Option<RecommendedWatcher>,
    timer: Option<JoinHandle<()>>,
    wake_tx: mpsc::Sender<()>,
}

impl ChangeTrigger {
    /// 注册监听和定时器
    ///
    /// 监听父目录而非文件本身，这样 rename / 重建也能收到通知。
    fn register(path: &Path, period: Duration, wake_tx: mpsc::Sender<()>) -> Result<Self> {
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());
        let watch_dir = path.parent().unwrap_or(path);

        let tx = wake_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        // 通道已满说明已有一次 check 在排队
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => {
                    tracing::warn!("⚠️ File watch error: {}", e);
                }
            }
        })?;
        watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

        let period = period.max(Duration::from_millis(1));
        let tx = wake_tx.clone();
        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(()) {
                    break;
                }
            }
        });

        Ok(Self {
            watcher: Some(watcher),
            timer: Some(timer),
            wake_tx,
        })
    }

    /// 手动触发一次 check（外部通知）
    pub fn fire(&self) {
        let _ = self.wake_tx.try_send(());
    }

    fn cancel(&mut self) {
        // drop watcher 即注销监听，回调不会再触发
        self.watcher.take();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ChangeTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 活跃的 tail 会话
pub struct TailSession {
    path: PathBuf,
    trigger: Option<ChangeTrigger>,
    shutdown: Option<oneshot::Sender<()>>,
    /// 停止标记；check 全程持有此锁
    stopped: Arc<Mutex<bool>>,
    offset: Arc<AtomicU64>,
}

impl TailSession {
    /// 启动会话（需在 tokio runtime 内调用）
    ///
    /// 文件不存在返回 `FileNotFound`，监听注册失败返回 `WatcherSetup`；
    /// 失败时不会留下任何触发器。
    pub fn start(
        path: &Path,
        update_interval: Duration,
        observer: Arc<dyn TailObserver>,
    ) -> Result<Self> {
        let tailer = Tailer::open(path)?;
        let path = tailer.path().to_path_buf();
        let offset = Arc::new(AtomicU64::new(tailer.offset()));

        let (wake_tx, wake_rx) = mpsc::channel::<()>(1);
        let requeue = wake_tx.downgrade();
        let trigger = ChangeTrigger::register(&path, update_interval, wake_tx)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stopped = Arc::new(Mutex::new(false));

        tokio::spawn(run_checks(
            tailer,
            wake_rx,
            requeue,
            shutdown_rx,
            observer,
            stopped.clone(),
            offset.clone(),
        ));

        tracing::info!(
            "👁️ 开始监控日志文件: {:?} (offset={}, interval={:?})",
            path,
            offset.load(Ordering::Relaxed),
            update_interval
        );

        Ok(Self {
            path,
            trigger: Some(trigger),
            shutdown: Some(shutdown_tx),
            stopped,
            offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 最近一次 check 完成后的偏移量
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// 请求一次 check；已有排队的 check 时合并
    pub fn trigger(&self) {
        if let Some(trigger) = &self.trigger {
            trigger.fire();
        }
    }

    /// 停止会话
    ///
    /// 正在执行的 check 会先完成（其事件照常投递）；返回后不会再开始新的 check。
    pub fn stop(&mut self) {
        *self.stopped.lock() = true;
        self.trigger.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 会话任务：串行执行 check
async fn run_checks(
    mut tailer: Tailer,
    mut wake_rx: mpsc::Receiver<()>,
    requeue: mpsc::WeakSender<()>,
    mut shutdown_rx: oneshot::Receiver<()>,
    observer: Arc<dyn TailObserver>,
    stopped: Arc<Mutex<bool>>,
    offset: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            woke = wake_rx.recv() => {
                if woke.is_none() {
                    break;
                }
            }
        }

        let gate = stopped.clone();
        let result = tokio::task::spawn_blocking(move || {
            let stopped = gate.lock();
            if *stopped {
                return (tailer, None);
            }
            let events = tailer.check();
            (tailer, Some(events))
        })
        .await;

        match result {
            Ok((t, Some(events))) => {
                tailer = t;
                offset.store(tailer.offset(), Ordering::Release);
                for event in events {
                    event.dispatch(observer.as_ref());
                }
                // 单次读取未读完，排队继续
                if tailer.has_backlog() {
                    if let Some(tx) = requeue.upgrade() {
                        let _ = tx.try_send(());
                    }
                }
            }
            Ok((_, None)) => break,
            Err(e) => {
                tracing::error!("check task failed: {}", e);
                break;
            }
        }
    }

    tracing::debug!(
        "Tail session task exited (offset={})",
        offset.load(Ordering::Relaxed)
    );
}
