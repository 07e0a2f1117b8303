//! 会话服务接口
//!
//! 会话令牌的签发与校验属于外部协作方，核心只通过该接口把令牌解析成身份。

use async_trait::async_trait;

use crate::errors::SessionError;
use crate::message::SenderIdentity;

/// 会话解析器
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// 解析令牌；未知或过期的令牌返回 `Ok(None)`
    async fn resolve(&self, token: &str) -> Result<Option<SenderIdentity>, SessionError>;
}
