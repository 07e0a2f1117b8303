//! 内存传输
//!
//! 用通道模拟一条双工连接，适合嵌入式使用和测试。[`MemoryPeer`] 扮演远端客户端。

use async_trait::async_trait;
use domain::{ChatMessage, Frame, FrameSink, FrameSource, TransportError};
use tokio::sync::mpsc;

const DEFAULT_CAPACITY: usize = 64;

/// 创建一条内存连接：(服务端读取端, 服务端写入端, 远端)
pub fn memory_transport() -> (MemorySource, MemorySink, MemoryPeer) {
    memory_transport_with_capacity(DEFAULT_CAPACITY)
}

/// 指定服务端到远端方向的缓冲容量；远端不读取时写入会挂起
pub fn memory_transport_with_capacity(capacity: usize) -> (MemorySource, MemorySink, MemoryPeer) {
    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let (to_peer_tx, to_peer_rx) = mpsc::channel(capacity.max(1));

    (
        MemorySource { frames: to_server_rx },
        MemorySink {
            frames: Some(to_peer_tx),
        },
        MemoryPeer {
            outgoing: to_server_tx,
            incoming: to_peer_rx,
        },
    )
}

pub struct MemorySource {
    frames: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.frames.recv().await
    }
}

pub struct MemorySink {
    frames: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        let Some(frames) = &self.frames else {
            return Err(TransportError::new("sink closed"));
        };
        frames
            .send(frame.to_owned())
            .await
            .map_err(|_| TransportError::new("peer disconnected"))
    }

    async fn close(&mut self) {
        self.frames.take();
    }
}

/// 内存连接的远端
pub struct MemoryPeer {
    outgoing: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    incoming: mpsc::Receiver<String>,
}

impl MemoryPeer {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.outgoing.send(Ok(Frame::Text(text.into())));
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.outgoing.send(Ok(Frame::Binary(bytes.into())));
    }

    pub fn send_message(&self, message: &ChatMessage) {
        if let Ok(text) = message.encode() {
            self.send_text(text);
        }
    }

    /// 模拟传输层读错误
    pub fn inject_error(&self, reason: &str) {
        let _ = self.outgoing.send(Err(TransportError::new(reason)));
    }

    /// 等待下一帧；服务端关闭连接后返回 `None`
    pub async fn recv(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    pub async fn recv_message(&mut self) -> Option<ChatMessage> {
        let text = self.recv().await?;
        ChatMessage::decode_str(&text).ok()
    }

    /// 非阻塞读取，当前没有帧时返回 `None`
    pub fn try_recv(&mut self) -> Option<String> {
        self.incoming.try_recv().ok()
    }

    /// 强制断开：两个方向同时失效
    pub fn disconnect(self) {
        drop(self);
    }
}
