//! 内存会话存储
//!
//! 令牌到身份的映射，带过期时间。令牌签发（登录）由外部流程调用 [`InMemorySessionStore::issue`]，
//! 中继核心只通过 [`SessionResolver`] 读取。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::{SenderIdentity, SessionError, SessionResolver};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 一条会话记录
#[derive(Debug, Clone)]
struct SessionRecord {
    identity: SenderIdentity,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 内存中的会话存储
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 签发令牌，返回随机生成的令牌字符串
    ///
    /// 中继本身不提供登录流程，调用方应是外部的登录/签发服务：
    /// 它共享同一个存储实例，验证用户后调用本方法，再把令牌以 `token` 查询参数或 Cookie 交给客户端。
    /// 未接入签发方时所有令牌都解析为匿名。
    pub async fn issue(&self, identity: SenderIdentity, ttl: Duration) -> String {
        let token = Uuid::new_v4().to_string();
        let record = SessionRecord {
            identity,
            expires_at: Utc::now() + ttl,
        };
        self.sessions.write().await.insert(token.clone(), record);
        debug!("session issued");
        token
    }

    /// 撤销令牌，返回令牌此前是否存在
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// 清理过期令牌，返回清理数量
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, "expired sessions purged");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionResolver for InMemorySessionStore {
    async fn resolve(&self, token: &str) -> Result<Option<SenderIdentity>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(token)
            .filter(|record| !record.is_expired(Utc::now()))
            .map(|record| record.identity.clone()))
    }
}
