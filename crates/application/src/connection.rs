//! 单个连接的句柄
//!
//! 一个双工连接在创建时拆成两半：
//! - [`ConnectionHandle`]：发送与关闭，注册后由连接注册表独占
//! - [`ConnectionInbound`]：接收，由该连接的读取任务独占
//!
//! 两半共享同一个取消令牌，任何一方关闭都会被另一方观察到。
//! 发送不会等待对端：消息先进入有界的发送队列，由独立的写入任务送到传输层；
//! 队列写满视为对端失效。

use std::{sync::Arc, time::Duration};

use domain::{
    ChatMessage, ConnectionId, Frame, FrameSink, FrameSource, ReceiveError, SendError,
    SenderIdentity,
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 已编码、可在多个连接之间共享的出站帧
pub type OutboundFrame = Arc<str>;

/// 连接的发送/关闭端
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Option<SenderIdentity>,
    outbound: mpsc::Sender<OutboundFrame>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Option<&SenderIdentity> {
        self.identity.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// 发送一条消息
    pub fn send(&self, message: &ChatMessage) -> Result<(), SendError> {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(connection_id = %self.id, error = %err, "failed to encode message");
                return Err(SendError::PeerGone);
            }
        };
        self.send_frame(frame.into())
    }

    /// 发送一条已编码的帧，广播时同一帧在所有连接间共享
    pub fn send_frame(&self, frame: OutboundFrame) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::PeerGone);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!(connection_id = %self.id, "outbound queue full, peer is too slow");
                Err(SendError::PeerGone)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::PeerGone),
        }
    }

    /// 关闭连接，可重复调用
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            debug!(connection_id = %self.id, "closing connection");
            self.closed.cancel();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// 连接的接收端
pub struct ConnectionInbound {
    id: ConnectionId,
    identity: Option<SenderIdentity>,
    source: Box<dyn FrameSource>,
    closed: CancellationToken,
}

impl ConnectionInbound {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// 挂起直到收到一条完整消息
    ///
    /// 连接带有会话身份时，消息的发送者字段会被替换为该身份。
    pub async fn receive(&mut self) -> Result<ChatMessage, ReceiveError> {
        if self.closed.is_cancelled() {
            return Err(ReceiveError::Closed);
        }

        let frame = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(ReceiveError::Closed),
            frame = self.source.next_frame() => frame,
        };

        let message = match frame {
            None => return Err(ReceiveError::Closed),
            Some(Err(err)) => {
                debug!(connection_id = %self.id, error = %err, "transport read failed");
                return Err(ReceiveError::Closed);
            }
            Some(Ok(Frame::Text(text))) => ChatMessage::decode_str(&text)?,
            Some(Ok(Frame::Binary(bytes))) => ChatMessage::decode_slice(&bytes)?,
        };

        Ok(match &self.identity {
            Some(identity) => message.attributed_to(identity),
            None => message,
        })
    }

    /// 关闭连接，可重复调用
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// 基于传输层的两端建立连接，并启动该连接的写入任务
///
/// 必须在 tokio 运行时中调用。
pub fn open_connection<Src, Snk>(
    source: Src,
    sink: Snk,
    identity: Option<SenderIdentity>,
    outbound_capacity: usize,
) -> (ConnectionHandle, ConnectionInbound)
where
    Src: FrameSource,
    Snk: FrameSink,
{
    let id = ConnectionId::generate();
    let closed = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));

    tokio::spawn(pump_outbound(id, sink, outbound_rx, closed.clone()));

    let handle = ConnectionHandle {
        id,
        identity: identity.clone(),
        outbound: outbound_tx,
        closed: closed.clone(),
    };
    let inbound = ConnectionInbound {
        id,
        identity,
        source: Box::new(source),
        closed,
    };
    (handle, inbound)
}

/// 关闭传输层的最长等待时间
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// 写入任务：把发送队列中的帧写到传输层，直到连接关闭
///
/// 正在进行的写入同样会被关闭打断，对端停止读取时写入任务也能退出。
async fn pump_outbound<Snk: FrameSink>(
    id: ConnectionId,
    mut sink: Snk,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            next = outbound.recv() => match next {
                Some(frame) => frame,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = closed.cancelled() => {
                debug!(connection_id = %id, "write interrupted by close");
                break;
            }
            written = sink.send_frame(&frame) => {
                if let Err(err) = written {
                    debug!(connection_id = %id, error = %err, "transport write failed");
                    break;
                }
            }
        }
    }
    closed.cancel();
    if timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        debug!(connection_id = %id, "transport close timed out");
    }
    drop(sink);
    debug!(connection_id = %id, "outbound writer stopped");
}
