//! WebSocket 处理器
//!
//! 完成连接升级与（可选的）会话身份解析，然后把 socket 交给中继核心。
//! [`WsFrameSource`] / [`WsFrameSink`] 把 axum 的 WebSocket 两半适配成领域层的传输接口。

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use domain::{
    Frame, FrameSink, FrameSource, SenderIdentity, SessionResolver, TransportError,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

/// WebSocket连接查询参数
#[derive(Debug, Default, Deserialize)]
pub struct WebSocketQuery {
    /// 会话令牌，优先于 Cookie
    pub token: Option<String>,
}

/// 处理WebSocket连接升级
pub async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WebSocketQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !state.acceptor.hub().is_running() {
        return Err(ApiError::service_unavailable("relay is shutting down"));
    }

    let token = query
        .token
        .or_else(|| cookie_value(&headers, &state.session.cookie_name));
    let identity = resolve_identity(state.sessions.as_ref(), token.as_deref()).await?;
    if identity.is_none() && state.session.require_identity {
        warn!("WebSocket upgrade rejected: no valid session");
        return Err(ApiError::unauthorized("a valid session is required"));
    }

    let acceptor = state.acceptor.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        match acceptor
            .accept(WsFrameSource::new(stream), WsFrameSink::new(sink), identity)
            .await
        {
            Ok(id) => debug!(connection_id = %id, "WebSocket connection accepted"),
            Err(err) => warn!(error = %err, "WebSocket connection rejected by hub"),
        }
    }))
}

/// 解析会话令牌；缺失或无效的令牌得到匿名连接
async fn resolve_identity(
    sessions: &dyn SessionResolver,
    token: Option<&str>,
) -> Result<Option<SenderIdentity>, ApiError> {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return Ok(None);
    };
    let identity = sessions.resolve(token).await?;
    if identity.is_none() {
        debug!("unknown or expired session token, connecting anonymously");
    }
    Ok(identity)
}

/// 从 Cookie 头中取出指定名称的值
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// WebSocket 读取端
pub struct WsFrameSource {
    stream: SplitStream<WebSocket>,
}

impl WsFrameSource {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(WsMessage::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                // axum 自动回复 ping
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                Ok(WsMessage::Close(frame)) => {
                    debug!(reason = ?frame, "client initiated close");
                    return None;
                }
                Err(err) => return Some(Err(TransportError::new(err.to_string()))),
            }
        }
    }
}

const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// WebSocket 写入端
pub struct WsFrameSink {
    sink: SplitSink<WebSocket, WsMessage>,
    closed: bool,
}

impl WsFrameSink {
    pub fn new(sink: SplitSink<WebSocket, WsMessage>) -> Self {
        Self {
            sink,
            closed: false,
        }
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::new("sink closed"));
        }
        self.sink
            .send(WsMessage::Text(frame.to_owned().into()))
            .await
            .map_err(|err| TransportError::new(err.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let closing = async {
            if let Err(err) = self.sink.send(WsMessage::Close(None)).await {
                debug!(error = %err, "failed to send close frame");
            }
            let _ = self.sink.close().await;
        };
        // 对端不再读取时 Close 帧可能永远写不出去
        if timeout(CLOSE_TIMEOUT, closing).await.is_err() {
            debug!("close handshake timed out");
        }
    }
}
