//! RelayLog Transport Traits
//!
//! 定义了统一的 Transport trait 接口，允许开发者实现自定义的日志输出目标。
//!
//! # 生命周期
//!
//! 1. `setup`：异步准备资源（打开文件、建立连接），完成后才计入就绪状态
//! 2. `output`：同步提交一条已渲染的日志，不得阻塞调用方
//! 3. `flush`：等待已提交的数据落地
//! 4. `close`：刷新并释放资源
//!
//! # 使用示例
//!
//! ```rust
//! use relay_log::core::entry::LogEntry;
//! use relay_log::core::levels::Rank;
//! use relay_log::transports::traits::{Transport, TransportResult};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn setup(&self) -> TransportResult<()> {
//!         Ok(())
//!     }
//!
//!     fn output(&self, _entry: &LogEntry, rendered: &str, _rank: Rank) -> TransportResult<()> {
//!         println!("{}", rendered);
//!         Ok(())
//!     }
//!
//!     async fn flush(&self) -> TransportResult<()> {
//!         Ok(())
//!     }
//!
//!     async fn close(&self) -> TransportResult<()> {
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> String {
//!         "my_transport".to_string()
//!     }
//! }
//! ```

use crate::core::entry::LogEntry;
use crate::core::levels::Rank;
use async_trait::async_trait;
use std::fmt::Debug;

/// 基础 Transport trait
///
/// 所有日志输出目标都必须实现此 trait。`output` 的提交顺序即为管理器的
/// 分发顺序，实现者需要自行保证内部缓冲的串行访问。
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// 准备输出目标
    async fn setup(&self) -> TransportResult<()>;

    /// 提交一条日志
    ///
    /// # 参数
    ///
    /// * `entry` - 原始日志条目
    /// * `rendered` - 按 `wants_style` 渲染好的单行文本
    /// * `rank` - 条目的 rank
    fn output(&self, entry: &LogEntry, rendered: &str, rank: Rank) -> TransportResult<()>;

    /// 刷新已提交的数据
    async fn flush(&self) -> TransportResult<()>;

    /// 关闭输出目标
    async fn close(&self) -> TransportResult<()>;

    /// 全局阈值变化时的回调
    ///
    /// 只有未设置阈值覆盖的传输会收到此回调。
    fn threshold_updated(&self, _threshold: Rank) {}

    /// 是否需要带终端样式的渲染
    fn wants_style(&self) -> bool {
        false
    }

    /// 诊断名称
    fn name(&self) -> String;
}

/// 通用 Transport 错误类型
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// 尚未完成 setup
    #[error("Transport is not ready")]
    NotReady,

    /// 已关闭
    #[error("Transport is closed")]
    Closed,

    /// 通用错误
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Transport 结果类型
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    // 测试用的 Mock Transport
    #[derive(Debug, Default)]
    struct MockTransport {
        output_count: AtomicU64,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn setup(&self) -> TransportResult<()> {
            Ok(())
        }

        fn output(&self, _entry: &LogEntry, _rendered: &str, _rank: Rank) -> TransportResult<()> {
            self.output_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&self) -> TransportResult<()> {
            Ok(())
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }

        fn name(&self) -> String {
            "mock".to_string()
        }
    }

    #[tokio::test]
    async fn test_default_hooks() {
        let transport = MockTransport::default();
        assert!(!transport.wants_style());
        transport.threshold_updated(Rank(1));
        assert!(transport.setup().await.is_ok());

        let entry = LogEntry::new("INFO", Rank(2), "hi");
        transport.output(&entry, "INFO hi", Rank(2)).unwrap();
        assert_eq!(transport.output_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::default());
        let entry = LogEntry::new("INFO", Rank(2), "hi");
        for _ in 0..3 {
            transport.output(&entry, "hi", Rank(2)).unwrap();
        }
        assert!(transport.flush().await.is_ok());
        assert!(transport.close().await.is_ok());
        assert_eq!(transport.name(), "mock");
    }

    #[test]
    fn test_transport_error_types() {
        let io_error = TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "Permission denied",
        ));
        assert!(io_error.to_string().contains("I/O error"));
        assert!(TransportError::Network("refused".to_string())
            .to_string()
            .contains("Network error"));
        assert!(TransportError::Closed.to_string().contains("closed"));
        assert!(TransportError::NotReady.to_string().contains("not ready"));
    }
}
