//! 领域错误定义
//!
//! 连接级别的错误只在该连接内部处理，不会传播给其他连接。

use thiserror::Error;

/// 向对端发送消息失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// 对端已断开、传输已关闭或发送队列已满
    #[error("peer is gone")]
    PeerGone,
}

/// 从对端接收消息失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// 对端断开或传输出错
    #[error("connection closed")]
    Closed,
    /// 无法解码的消息
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ReceiveError {
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// 底层传输错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 会话服务错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session backend unavailable: {0}")]
    Unavailable(String),
}
