//! 广播中心
//!
//! 单任务分发器：按到达顺序逐个处理事件，驱动注册表变更和消息扇出。
//! 注册表只在该任务内部被访问，其他任务只能通过 [`HubHandle`] 投递事件。

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use config::{HubConfig, OverflowPolicy};
use domain::{ChatMessage, ConnectionId};
use serde::Serialize;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{connection::ConnectionHandle, error::HubError, registry::ConnectionRegistry};

/// 广播中心处理的内部事件
#[derive(Debug)]
pub enum HubEvent {
    /// 新连接，句柄的所有权随事件转移给注册表
    Connect(ConnectionHandle),
    /// 连接断开
    Disconnect(ConnectionId),
    /// 某连接收到的一条消息，`seq` 在单个连接内单调递增
    Inbound {
        from: ConnectionId,
        seq: u64,
        message: ChatMessage,
    },
    /// 读取注册表快照
    Snapshot(oneshot::Sender<RegistrySnapshot>),
}

/// 广播中心运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub messages_broadcast: u64,
    pub deliveries: u64,
    pub peers_dropped: u64,
    pub inbound_rejected: u64,
}

/// 注册表快照
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub connections: Vec<ConnectionId>,
    pub stats: HubStats,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }
}

/// 向广播中心投递事件的句柄，可克隆
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    shutdown: CancellationToken,
    overflow: OverflowPolicy,
    rejected: Arc<AtomicU64>,
}

impl HubHandle {
    /// 投递新连接；广播中心已停止时关闭该连接
    pub async fn connect(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        self.events
            .send(HubEvent::Connect(handle))
            .await
            .map_err(|mpsc::error::SendError(event)| {
                if let HubEvent::Connect(handle) = event {
                    handle.close();
                }
                HubError::Stopped
            })
    }

    pub async fn disconnect(&self, id: ConnectionId) -> Result<(), HubError> {
        self.events
            .send(HubEvent::Disconnect(id))
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// 投递入站消息，队列写满时按溢出策略处理
    pub async fn inbound(
        &self,
        from: ConnectionId,
        seq: u64,
        message: ChatMessage,
    ) -> Result<(), HubError> {
        let event = HubEvent::Inbound { from, seq, message };
        match self.overflow {
            OverflowPolicy::RejectNew => self.events.try_send(event).map_err(|err| match err {
                TrySendError::Full(_) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    HubError::QueueFull
                }
                TrySendError::Closed(_) => HubError::Stopped,
            }),
            OverflowPolicy::Backpressure => self
                .events
                .send(event)
                .await
                .map_err(|_| HubError::Stopped),
        }
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, HubError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(HubEvent::Snapshot(reply))
            .await
            .map_err(|_| HubError::Stopped)?;
        response.await.map_err(|_| HubError::Stopped)
    }

    /// 请求停止：关闭所有连接并退出事件循环
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// 因队列写满被拒绝的入站消息数
    pub fn inbound_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.events.is_closed()
    }
}

/// 广播中心
pub struct BroadcastHub {
    registry: ConnectionRegistry,
    events: mpsc::Receiver<HubEvent>,
    shutdown: CancellationToken,
    include_sender: bool,
    rejected: Arc<AtomicU64>,
    stats: HubStats,
}

impl BroadcastHub {
    pub fn new(config: &HubConfig) -> (Self, HubHandle) {
        let (events_tx, events_rx) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = CancellationToken::new();
        let rejected = Arc::new(AtomicU64::new(0));

        let handle = HubHandle {
            events: events_tx,
            shutdown: shutdown.clone(),
            overflow: config.overflow,
            rejected: rejected.clone(),
        };
        let hub = Self {
            registry: ConnectionRegistry::new(),
            events: events_rx,
            shutdown,
            include_sender: config.include_sender,
            rejected,
            stats: HubStats::default(),
        };
        (hub, handle)
    }

    /// 在独立任务中启动，任务结束时返回最终统计
    pub fn spawn(config: &HubConfig) -> (HubHandle, JoinHandle<HubStats>) {
        let (hub, handle) = Self::new(config);
        (handle, tokio::spawn(hub.run()))
    }

    /// 事件循环；收到停止请求或所有句柄都被释放后退出
    pub async fn run(mut self) -> HubStats {
        info!("broadcast hub started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        self.close_all();
        info!(stats = ?self.stats, "broadcast hub stopped");
        self.stats
    }

    fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect(handle) => self.register(handle),
            HubEvent::Disconnect(id) => self.unregister(id),
            HubEvent::Inbound { from, seq, message } => self.broadcast(from, seq, &message),
            HubEvent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn register(&mut self, handle: ConnectionHandle) {
        let id = handle.id();
        if let Some(previous) = self.registry.register(handle) {
            previous.close();
        }
        self.stats.connections_opened += 1;
        info!(connection_id = %id, peers = self.registry.len(), "connection registered");
    }

    fn unregister(&mut self, id: ConnectionId) {
        if let Some(handle) = self.registry.unregister(id) {
            handle.close();
            self.stats.connections_closed += 1;
            info!(connection_id = %id, peers = self.registry.len(), "connection unregistered");
        }
    }

    fn broadcast(&mut self, from: ConnectionId, seq: u64, message: &ChatMessage) {
        let frame = match message.encode() {
            Ok(frame) => Arc::<str>::from(frame),
            Err(err) => {
                warn!(connection_id = %from, seq, error = %err, "failed to encode message");
                return;
            }
        };

        let include_sender = self.include_sender;
        let mut deliveries = 0u64;
        let dropped = self.registry.sweep(|handle| {
            if !include_sender && handle.id() == from {
                return true;
            }
            match handle.send_frame(frame.clone()) {
                Ok(()) => {
                    deliveries += 1;
                    true
                }
                Err(_) => false,
            }
        });

        for handle in &dropped {
            handle.close();
            info!(connection_id = %handle.id(), "peer dropped after failed send");
        }

        self.stats.messages_broadcast += 1;
        self.stats.deliveries += deliveries;
        self.stats.peers_dropped += dropped.len() as u64;
        self.stats.connections_closed += dropped.len() as u64;
        debug!(
            connection_id = %from,
            seq,
            deliveries,
            dropped = dropped.len(),
            "message broadcast"
        );
    }

    fn snapshot(&self) -> RegistrySnapshot {
        let mut stats = self.stats.clone();
        stats.inbound_rejected = self.rejected.load(Ordering::Relaxed);
        RegistrySnapshot {
            connections: self.registry.ids(),
            stats,
        }
    }

    /// 关闭所有已注册连接，以及仍在队列中等待注册的连接
    fn close_all(&mut self) {
        self.events.close();
        while let Ok(event) = self.events.try_recv() {
            if let HubEvent::Connect(handle) = event {
                handle.close();
            }
        }

        let remaining = self.registry.drain();
        self.stats.connections_closed += remaining.len() as u64;
        for handle in remaining {
            handle.close();
        }
        self.stats.inbound_rejected = self.rejected.load(Ordering::Relaxed);
    }
}
