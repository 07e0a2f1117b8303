//! 连接读取任务
//!
//! 每个连接恰好一个读取任务，它是该连接 `Inbound` / `Disconnect` 事件的唯一生产者，
//! 因此同一连接的事件严格有序。

use config::MalformedPolicy;
use domain::{ConnectionId, ReceiveError};
use tracing::{debug, info, warn};

use crate::{connection::ConnectionInbound, error::HubError, hub::HubHandle};

/// 读取任务退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// 对端断开或传输出错
    Closed,
    /// 收到无法解析的消息
    Malformed(String),
    /// 广播中心已停止
    HubStopped,
}

pub struct ConnectionReader {
    inbound: ConnectionInbound,
    hub: HubHandle,
    malformed: MalformedPolicy,
    last_seq: u64,
}

impl ConnectionReader {
    pub fn new(inbound: ConnectionInbound, hub: HubHandle, malformed: MalformedPolicy) -> Self {
        Self {
            inbound,
            hub,
            malformed,
            last_seq: 0,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.inbound.id()
    }

    /// 读取循环，直到连接关闭
    pub async fn run(mut self) -> ReaderExit {
        let id = self.inbound.id();
        let exit = loop {
            match self.inbound.receive().await {
                Ok(message) => {
                    self.last_seq += 1;
                    let seq = self.last_seq;
                    match self.hub.inbound(id, seq, message).await {
                        Ok(()) => {}
                        Err(HubError::QueueFull) => {
                            warn!(connection_id = %id, seq, "hub queue full, message dropped");
                        }
                        Err(HubError::Stopped) => break ReaderExit::HubStopped,
                    }
                }
                Err(ReceiveError::Malformed(reason)) => match self.malformed {
                    MalformedPolicy::Skip => {
                        warn!(connection_id = %id, %reason, "skipping malformed message");
                    }
                    MalformedPolicy::Disconnect => {
                        warn!(connection_id = %id, %reason, "malformed message, disconnecting");
                        break ReaderExit::Malformed(reason);
                    }
                },
                Err(ReceiveError::Closed) => {
                    debug!(connection_id = %id, "peer closed");
                    break ReaderExit::Closed;
                }
            }
        };

        if exit == ReaderExit::HubStopped || self.hub.disconnect(id).await.is_err() {
            self.inbound.close();
        }
        info!(connection_id = %id, messages = self.last_seq, reason = ?exit, "reader finished");
        exit
    }
}
