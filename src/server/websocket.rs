//! WebSocket 连接处理

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::hub::BroadcastHub;
use crate::tail::TailService;

/// 每个连接的出站队列长度，满了丢帧
const OUTBOX_CAPACITY: usize = 256;

/// 连接关闭后等待发送任务收尾的时间
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 接受连接
pub(super) async fn accept_loop(
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
    tail: Arc<TailService>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let hub = hub.clone();
                let tail = tail.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, hub, tail).await {
                        tracing::debug!("WebSocket 连接异常: peer={}, {:#}", peer, e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("接受连接失败: {}", e);
            }
        }
    }
}

/// 处理单个查看者连接
async fn handle_connection(
    stream: TcpStream,
    hub: Arc<BroadcastHub>,
    tail: Arc<TailService>,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket 握手失败")?;
    let (mut sink, mut source) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let conn_id = hub.register(tx, &tail.display_name());
    tracing::info!("新的WebSocket连接，当前连接数: {}", hub.count());

    // 发送任务：出站队列 → 文本帧
    let writer_hub = hub.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::text(msg)).await.is_err() {
                break;
            }
        }
        writer_hub.mark_closed(conn_id);
        let _ = sink.close().await;
    });

    // 查看者不发送指令，只关心关闭
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Close(_)) => {
                hub.mark_closing(conn_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("读取失败: conn_id={}, {}", conn_id, e);
                hub.mark_closed(conn_id);
                break;
            }
        }
    }

    // 注销后出站队列关闭，发送任务随之结束
    hub.unregister(conn_id);
    let abort = write_handle.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, write_handle).await.is_err() {
        abort.abort();
    }
    tracing::info!("WebSocket连接已关闭，当前连接数: {}", hub.count());

    Ok(())
}
