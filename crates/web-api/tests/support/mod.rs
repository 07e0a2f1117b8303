#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{BroadcastHub, ConnectionAcceptor, HubHandle, HubStats};
use config::{HubConfig, SessionConfig};
use futures_util::{SinkExt, StreamExt};
use infrastructure::InMemorySessionStore;
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// 运行在随机端口上的测试服务
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: HubHandle,
    pub sessions: InMemorySessionStore,
    hub_task: Option<JoinHandle<HubStats>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(HubConfig::default(), SessionConfig::default()).await
    }

    pub async fn start_with(hub_config: HubConfig, session: SessionConfig) -> Self {
        let (hub, hub_task) = BroadcastHub::spawn(&hub_config);
        let sessions = InMemorySessionStore::new();
        let acceptor = ConnectionAcceptor::new(hub.clone(), hub_config);
        let state = AppState::new(acceptor, Arc::new(sessions.clone()), session);
        let app = router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            hub,
            sessions,
            hub_task: Some(hub_task),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> WsClient {
        self.connect_path("/api/v1/ws").await
    }

    pub async fn connect_path(&self, path: &str) -> WsClient {
        let (socket, _) = connect_async(self.ws_url(path))
            .await
            .expect("websocket connect");
        socket
    }

    /// 轮询统计接口直到连接数达到预期
    pub async fn wait_for_connections(&self, expected: usize) -> Value {
        let client = reqwest::Client::new();
        for _ in 0..100 {
            let stats: Value = client
                .get(self.http_url("/api/v1/stats"))
                .send()
                .await
                .expect("stats request")
                .json()
                .await
                .expect("stats json");
            if stats["connections"].as_u64() == Some(expected as u64) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("registry never reached {} connections", expected);
    }

    /// 停止广播中心并返回最终统计
    pub async fn stop_hub(&mut self) -> HubStats {
        self.hub.shutdown();
        let task = self.hub_task.take().expect("hub already stopped");
        task.await.expect("hub task")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.hub.shutdown();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn send_json(socket: &mut WsClient, value: Value) {
    socket
        .send(TungsteniteMessage::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// 读取下一条文本消息并解析为 JSON，跳过控制帧
pub async fn recv_json(socket: &mut WsClient) -> Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match frame {
            TungsteniteMessage::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("json frame")
            }
            TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

/// 等待服务端关闭连接
pub async fn expect_closed(socket: &mut WsClient) {
    loop {
        match timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(TungsteniteMessage::Close(_))) => return,
            Some(Ok(TungsteniteMessage::Ping(_))) | Some(Ok(TungsteniteMessage::Pong(_))) => {}
            Some(Ok(other)) => panic!("expected close, got {:?}", other),
        }
    }
}
