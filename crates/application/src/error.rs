use thiserror::Error;

/// 与广播中心交互时的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// 事件队列已满，入站消息被拒绝
    #[error("hub event queue is full")]
    QueueFull,
    /// 广播中心已停止
    #[error("hub has stopped")]
    Stopped,
}
