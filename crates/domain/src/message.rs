//! 聊天消息值对象
//!
//! 线上格式为 JSON 对象 `{"email": ..., "username": ..., "message": ...}`，
//! 字段顺序无关，缺失字段按空字符串处理。

use serde::{Deserialize, Serialize};

use crate::errors::ReceiveError;

/// 发送者身份，由会话服务附加到连接上
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub email: String,
    pub username: String,
}

impl SenderIdentity {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
        }
    }
}

/// 一条聊天消息，构造后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessage {
    email: String,
    username: String,
    message: String,
}

impl ChatMessage {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            message: message.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn body(&self) -> &str {
        &self.message
    }

    /// 发送者是否匿名（两个身份字段都为空）
    pub fn is_anonymous(&self) -> bool {
        self.email.is_empty() && self.username.is_empty()
    }

    /// 用会话身份覆盖发送者字段，返回新消息
    pub fn attributed_to(self, identity: &SenderIdentity) -> Self {
        Self {
            email: identity.email.clone(),
            username: identity.username.clone(),
            message: self.message,
        }
    }

    /// 从文本帧解码
    pub fn decode_str(text: &str) -> Result<Self, ReceiveError> {
        serde_json::from_str(text).map_err(ReceiveError::malformed)
    }

    /// 从二进制帧解码
    pub fn decode_slice(bytes: &[u8]) -> Result<Self, ReceiveError> {
        serde_json::from_slice(bytes).map_err(ReceiveError::malformed)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
