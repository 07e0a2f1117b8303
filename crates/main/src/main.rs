//! 主应用程序入口
//!
//! 加载配置，启动广播中心与 Axum Web 服务，收到 Ctrl-C 后优雅停机。

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::{BroadcastHub, ConnectionAcceptor, HubHandle};
use config::AppConfig;
use infrastructure::InMemorySessionStore;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    // RUST_LOG 优先于配置文件
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (hub, hub_task) = BroadcastHub::spawn(&config.hub);
    let acceptor = ConnectionAcceptor::new(hub.clone(), config.hub.clone());

    let sessions = InMemorySessionStore::new();
    let purge = spawn_session_purge(
        sessions.clone(),
        Duration::from_secs(config.session.purge_interval_seconds.max(1)),
    );

    let mut state = AppState::new(acceptor, Arc::new(sessions), config.session.clone());
    if let Some(dir) = &config.server.static_dir {
        state = state.with_static_dir(dir);
    }
    let app = router(state);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("聊天中继服务启动在 http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await
        .context("server error")?;

    purge.abort();
    hub.shutdown();
    match hub_task.await {
        Ok(stats) => {
            tracing::info!(?stats, "relay stopped");
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "broadcast hub task failed");
            std::process::exit(1);
        }
    }
}

/// 定期清理过期会话
fn spawn_session_purge(
    sessions: InMemorySessionStore,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            sessions.purge_expired().await;
        }
    })
}

/// 等待 Ctrl-C，然后先停止广播中心，使所有 WebSocket 连接关闭
async fn shutdown_signal(hub: HubHandle) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
    hub.shutdown();
}
