//! 接入路径
//!
//! 宿主完成连接升级后调用 [`ConnectionAcceptor::accept`]：建立连接句柄，
//! 投递 `Connect` 事件，然后为该连接启动读取任务。

use config::HubConfig;
use domain::{ConnectionId, FrameSink, FrameSource, SenderIdentity};
use tracing::{info_span, Instrument};

use crate::{
    connection::open_connection, error::HubError, hub::HubHandle, reader::ConnectionReader,
};

#[derive(Debug, Clone)]
pub struct ConnectionAcceptor {
    hub: HubHandle,
    config: HubConfig,
}

impl ConnectionAcceptor {
    pub fn new(hub: HubHandle, config: HubConfig) -> Self {
        Self { hub, config }
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// 接入一条新连接，返回其标识
    ///
    /// 广播中心已停止时连接会被立即关闭，不会启动读取任务。
    pub async fn accept<Src, Snk>(
        &self,
        source: Src,
        sink: Snk,
        identity: Option<SenderIdentity>,
    ) -> Result<ConnectionId, HubError>
    where
        Src: FrameSource,
        Snk: FrameSink,
    {
        let (handle, inbound) =
            open_connection(source, sink, identity, self.config.outbound_capacity);
        let id = handle.id();

        self.hub.connect(handle).await?;

        let reader = ConnectionReader::new(inbound, self.hub.clone(), self.config.malformed);
        tokio::spawn(reader.run().instrument(info_span!("connection", connection_id = %id)));
        Ok(id)
    }
}
