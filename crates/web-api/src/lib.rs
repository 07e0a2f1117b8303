//! Web API 层。
//!
//! 提供 Axum 路由，把 WebSocket 连接交给应用层的中继核心，并暴露健康检查与统计接口。

mod error;
mod routes;
mod state;
mod websocket;

pub use error::{ApiError, ErrorBody};
pub use routes::{router, StatsResponse};
pub use state::AppState;
pub use websocket::{websocket_upgrade, WebSocketQuery, WsFrameSink, WsFrameSource};
