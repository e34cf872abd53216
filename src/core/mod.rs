//! RelayLog 核心模块
//!
//! 级别注册表、日志条目、上下文发射器、待发送队列、日志器与日志管理器，
//! 以及把 `tracing` 事件接入管道的桥接层。

pub mod bridge;
pub mod emitter;
pub mod entry;
pub mod levels;
pub mod logger;
pub mod manager;
pub mod queue;

// 重新导出核心类型
pub use bridge::RelayLayer;
pub use emitter::{
    ContextEmitter, ElapsedResolver, EntryContext, EntryResult, FlushCallback, Thresholds,
};
pub use entry::{EntryData, Formatter, Layout, LogEntry, Payload, ShowOptions, TimestampMode};
pub use levels::{
    LevelDefinition, LevelProfile, LevelRegistry, LevelSelector, LevelStyle, Rank, StandardLevel,
};
pub use logger::{Logger, MessageBuilder, PerfMarks};
pub use manager::{LogManager, ManagerState};
pub use queue::{PendingQueue, Submission, DEFAULT_QUEUE_CAPACITY};
