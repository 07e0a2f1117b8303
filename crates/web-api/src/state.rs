use std::{path::PathBuf, sync::Arc};

use application::ConnectionAcceptor;
use config::SessionConfig;
use domain::SessionResolver;

#[derive(Clone)]
pub struct AppState {
    pub acceptor: ConnectionAcceptor,
    pub sessions: Arc<dyn SessionResolver>,
    pub session: SessionConfig,
    /// 静态资源目录，作为路由兜底
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        acceptor: ConnectionAcceptor,
        sessions: Arc<dyn SessionResolver>,
        session: SessionConfig,
    ) -> Self {
        Self {
            acceptor,
            sessions,
            session,
            static_dir: None,
        }
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }
}
