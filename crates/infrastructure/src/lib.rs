//! 基础设施层实现。
//!
//! 提供领域层接口的具体适配器，目前是内存会话存储。

pub mod session;

pub use session::InMemorySessionStore;
