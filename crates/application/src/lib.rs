//! 应用层实现。
//!
//! 中继核心：连接句柄、连接注册表、广播中心、每连接读取任务，以及把它们串起来的接入路径。

pub mod acceptor;
pub mod connection;
pub mod error;
pub mod hub;
pub mod memory;
pub mod reader;
pub mod registry;

pub use acceptor::ConnectionAcceptor;
pub use connection::{open_connection, ConnectionHandle, ConnectionInbound, OutboundFrame};
pub use error::HubError;
pub use hub::{BroadcastHub, HubEvent, HubHandle, HubStats, RegistrySnapshot};
pub use memory::{memory_transport, memory_transport_with_capacity, MemoryPeer, MemorySink, MemorySource};
pub use reader::{ConnectionReader, ReaderExit};
pub use registry::ConnectionRegistry;
