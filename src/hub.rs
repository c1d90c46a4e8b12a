//! 广播中心
//!
//! 维护查看者连接列表，将文本推送给所有处于 Open 状态的连接。
//! 单个连接发送失败不影响其他连接，也不会修改连接列表；
//! 连接只能通过 [`BroadcastHub::unregister`] 移除。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::welcome_message;

/// 连接 ID
pub type ConnId = u64;

/// 消息发送通道（连接的出站队列）
pub type MessageSender = mpsc::Sender<String>;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// 正常收发
    Open,
    /// 已收到关闭帧，等待注销
    Closing,
    /// 传输层已断开，等待注销
    Closed,
}

struct Connection {
    sender: MessageSender,
    state: ConnState,
}

/// 广播中心
pub struct BroadcastHub {
    /// 连接：ConnId → 出站队列 + 状态
    connections: RwLock<HashMap<ConnId, Connection>>,
    /// 下一个连接 ID
    next_conn_id: RwLock<ConnId>,
}

impl BroadcastHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册新连接并发送欢迎消息，返回连接 ID
    ///
    /// 欢迎消息在加入列表前入队，之后的广播一定排在它后面；不发送历史内容。
    pub fn register(&self, sender: MessageSender, file_name: &str) -> ConnId {
        let conn_id = {
            let mut next_id = self.next_conn_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let mut connections = self.connections.write();
        if let Err(e) = sender.try_send(welcome_message(file_name)) {
            tracing::debug!("📡 Welcome not delivered: conn_id={}, {}", conn_id, e);
        }
        connections.insert(
            conn_id,
            Connection {
                sender,
                state: ConnState::Open,
            },
        );

        tracing::debug!("📡 Connection registered: conn_id={}", conn_id);
        conn_id
    }

    /// 注销连接；重复注销是 no-op，返回是否确有移除
    pub fn unregister(&self, conn_id: ConnId) -> bool {
        let removed = self.connections.write().remove(&conn_id).is_some();
        if removed {
            tracing::debug!("📡 Connection unregistered: conn_id={}", conn_id);
        }
        removed
    }

    /// 标记连接正在关闭（收到关闭帧）
    pub fn mark_closing(&self, conn_id: ConnId) {
        self.transition(conn_id, ConnState::Closing);
    }

    /// 标记连接已断开
    pub fn mark_closed(&self, conn_id: ConnId) {
        self.transition(conn_id, ConnState::Closed);
    }

    fn transition(&self, conn_id: ConnId, to: ConnState) {
        if let Some(conn) = self.connections.write().get_mut(&conn_id) {
            // 状态只前进：Open → Closing → Closed
            let allowed = matches!(
                (conn.state, to),
                (ConnState::Open, ConnState::Closing)
                    | (ConnState::Open, ConnState::Closed)
                    | (ConnState::Closing, ConnState::Closed)
            );
            if allowed {
                conn.state = to;
            }
        }
    }

    /// 查询连接状态
    pub fn state(&self, conn_id: ConnId) -> Option<ConnState> {
        self.connections.read().get(&conn_id).map(|c| c.state)
    }

    /// 广播给所有 Open 连接（非阻塞，fire-and-forget）
    ///
    /// 返回成功入队的连接数，仅用于诊断。
    pub fn broadcast(&self, payload: &str) -> usize {
        let targets: Vec<(ConnId, MessageSender)> = {
            let connections = self.connections.read();
            connections
                .iter()
                .filter(|(_, conn)| conn.state == ConnState::Open)
                .map(|(id, conn)| (*id, conn.sender.clone()))
                .collect()
        };

        if targets.is_empty() {
            tracing::trace!("📡 No viewers connected, dropping {} bytes", payload.len());
            return 0;
        }

        tracing::trace!(
            "📡 Broadcasting {} bytes to {} viewers",
            payload.len(),
            targets.len()
        );

        let mut delivered = 0;
        for (conn_id, sender) in targets {
            match sender.try_send(payload.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("📡 Channel full, dropping message: conn_id={}", conn_id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("📡 Channel closed: conn_id={}", conn_id);
                }
            }
        }
        delivered
    }

    /// 当前连接数
    pub fn count(&self) -> usize {
        self.connections.read().len()
    }

    /// 检查是否有活跃连接
    pub fn has_connections(&self) -> bool {
        !self.connections.read().is_empty()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_conn_id: RwLock::new(1),
        }
    }
}
