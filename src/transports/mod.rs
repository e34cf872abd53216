//! RelayLog Transports 模块
//!
//! 提供统一的 Transport trait、负责扇出与生命周期的传输管理器，
//! 以及控制台、文件、网络和空传输的实现。

pub mod console;
pub mod file;
pub mod manager;
pub mod network;
pub mod null;
pub mod traits;
pub(crate) mod worker;

// 重新导出主要类型
pub use console::ConsoleTransport;
pub use file::FileTransport;
pub use manager::{TransportId, TransportManager};
pub use network::NetworkTransport;
pub use null::NullTransport;
pub use traits::{Transport, TransportError, TransportResult};
