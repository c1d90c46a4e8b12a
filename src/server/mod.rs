//! 服务层 - 把 tail 事件接到广播中心，并对外提供 WebSocket / HTTP
//!
//! - WebSocket (`ws_port`): 查看者连接，接收纯文本日志帧
//! - HTTP (`http_port`): `/api/restart`、`/api/config` + 静态资源

mod http;
mod websocket;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::hub::BroadcastHub;
use crate::protocol::TRUNCATION_NOTICE;
use crate::tail::{TailObserver, TailService, Truncation};

/// 把 tail 事件转发给所有查看者
pub struct HubForwarder {
    hub: Arc<BroadcastHub>,
}

impl HubForwarder {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }
}

impl TailObserver for HubForwarder {
    fn on_content_appended(&self, content: &str) {
        self.hub.broadcast(content);
    }

    fn on_tail_error(&self, message: &str) {
        self.hub.broadcast(message);
    }

    fn on_truncated(&self, _truncation: Truncation) {
        self.hub.broadcast(TRUNCATION_NOTICE);
    }
}

/// 实时日志服务
pub struct LogServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    tail: Arc<TailService>,
}

impl LogServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let hub = BroadcastHub::new();
        let forwarder = Arc::new(HubForwarder::new(hub.clone()));
        let tail = Arc::new(TailService::from_config(&config, forwarder));

        Arc::new(Self { config, hub, tail })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn tail(&self) -> &Arc<TailService> {
        &self.tail
    }

    /// 绑定配置端口并运行，直到收到 Ctrl-C
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let ws_listener = TcpListener::bind(("0.0.0.0", self.config.ws_port))
            .await
            .with_context(|| format!("绑定 WebSocket 端口 {} 失败", self.config.ws_port))?;
        let http_listener = TcpListener::bind(("0.0.0.0", self.config.http_port))
            .await
            .with_context(|| format!("绑定 HTTP 端口 {} 失败", self.config.http_port))?;

        self.serve_until(ws_listener, http_listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("监听中断信号失败: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("收到中断信号，准备退出...");
        })
        .await
    }

    /// 在给定的监听器上运行，直到 `shutdown` 完成
    pub async fn serve_until<F>(
        self: Arc<Self>,
        ws_listener: TcpListener,
        http_listener: TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        // 文件暂不存在时不退出，之后可通过 /api/restart 恢复
        if let Err(e) = self.tail.start() {
            tracing::warn!("⚠️ 日志监控未启动: {}", e);
        }

        let ws_addr = ws_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        let ws_task = tokio::spawn(websocket::accept_loop(
            ws_listener,
            self.hub.clone(),
            self.tail.clone(),
        ));
        tracing::info!("WebSocket服务器已启动，端口: {}", ws_addr.port());

        let router = http::router(
            self.tail.clone(),
            self.config.max_lines,
            &self.config.public_dir,
        );
        let http_task = tokio::spawn(async move { axum::serve(http_listener, router).await });
        tracing::info!("HTTP服务器已启动: http://localhost:{}", http_addr.port());

        tracing::info!("🚀 实时日志系统已启动");
        shutdown.await;

        ws_task.abort();
        http_task.abort();
        self.tail.stop();
        tracing::info!("🧹 服务已停止");
        Ok(())
    }
}
