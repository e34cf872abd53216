//! 空传输
//!
//! `LogManager` 在没有注册任何传输时使用的默认目标：立即就绪，丢弃所有输出。

use crate::core::entry::LogEntry;
use crate::core::levels::Rank;
use crate::transports::traits::{Transport, TransportResult};
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn setup(&self) -> TransportResult<()> {
        Ok(())
    }

    fn output(&self, _entry: &LogEntry, _rendered: &str, _rank: Rank) -> TransportResult<()> {
        Ok(())
    }

    async fn flush(&self) -> TransportResult<()> {
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }

    fn name(&self) -> String {
        "null".to_string()
    }
}
