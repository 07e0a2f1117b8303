//! 传输层接口
//!
//! 核心只依赖这两个接口，不关心底层是 WebSocket 还是内存通道。
//! 心跳（ping/pong）由具体传输实现自行处理，不会出现在帧流中。

use async_trait::async_trait;

use crate::errors::TransportError;

/// 一个完整的入站数据帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// 连接的读取端
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// 挂起直到下一帧到达；`None` 表示对端已关闭连接
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// 连接的写入端
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// 写入一条已编码的文本帧
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError>;

    /// 关闭写入端并释放底层资源，可重复调用
    async fn close(&mut self);
}
