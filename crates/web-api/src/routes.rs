use application::{HubStats, RegistrySnapshot};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use domain::ConnectionId;
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{error::ApiError, state::AppState, websocket::websocket_upgrade};

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub connection_ids: Vec<ConnectionId>,
    pub hub: HubStats,
}

impl From<RegistrySnapshot> for StatsResponse {
    fn from(snapshot: RegistrySnapshot) -> Self {
        Self {
            connections: snapshot.len(),
            connection_ids: snapshot.connections,
            hub: snapshot.stats,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        // 兼容旧客户端的路径
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes());

    if let Some(dir) = &state.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(websocket_upgrade))
        .route("/stats", get(stats))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let snapshot = state.acceptor.hub().snapshot().await?;
    Ok(Json(snapshot.into()))
}
