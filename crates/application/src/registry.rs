//! 连接注册表
//!
//! 存活连接集合的唯一所有者。注册表只存在于广播中心的任务内部，
//! 所有读写都发生在同一个执行上下文中，因此不需要任何锁。

use std::collections::HashMap;

use domain::ConnectionId;

use crate::connection::ConnectionHandle;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接；相同标识重复注册时覆盖，并返回被替换的旧句柄
    pub fn register(&mut self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.connections.insert(handle.id(), handle)
    }

    /// 注销连接，不存在时什么也不做
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&id)
    }

    /// 对每个已注册的连接调用一次 `action`，顺序不确定
    pub fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&ConnectionHandle),
    {
        for handle in self.connections.values() {
            action(handle);
        }
    }

    /// 遍历所有连接，`action` 返回 `false` 的连接在本轮内被移除并返回
    pub fn sweep<F>(&mut self, mut action: F) -> Vec<ConnectionHandle>
    where
        F: FnMut(&ConnectionHandle) -> bool,
    {
        let failed: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|handle| !action(*handle))
            .map(ConnectionHandle::id)
            .collect();

        failed
            .into_iter()
            .filter_map(|id| self.connections.remove(&id))
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// 取出全部连接，注册表变为空
    pub fn drain(&mut self) -> Vec<ConnectionHandle> {
        self.connections.drain().map(|(_, handle)| handle).collect()
    }
}
