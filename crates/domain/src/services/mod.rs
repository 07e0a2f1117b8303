//! 领域服务接口定义

pub mod session_service;
pub mod transport_service;

pub use session_service::*;
pub use transport_service::*;
