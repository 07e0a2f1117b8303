//! 聊天中继核心领域模型
//!
//! 包含聊天消息、连接标识、传输与会话接口，以及相关的错误类型。

pub mod errors;
pub mod message;
pub mod services;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::*;
pub use services::*;
pub use value_objects::*;
