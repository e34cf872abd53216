//! 定义 RelayLog 日志管道的内部诊断与指标。
//!
//! 此模块提供了对管道健康状况的可观测性：分发、排队、丢弃与传输错误计数。
//! 每个 `LogManager` 持有自己的实例，不存在全局状态。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 内部诊断与指标数据结构。
///
/// 使用原子操作确保线程安全。
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// 创建时间
    start_time: Option<Instant>,

    /// 进入扇出的日志条目数
    entries_dispatched: AtomicU64,

    /// 因传输未就绪而进入待发送队列的条目数
    entries_queued: AtomicU64,

    /// 重新初始化时无法解析而丢弃的条目数
    entries_dropped: AtomicU64,

    /// 成功提交给单个传输的次数
    transport_outputs: AtomicU64,

    /// 传输错误计数（output/setup/flush/close）
    transport_errors: AtomicU64,

    /// 队列排空次数
    queue_flushes: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsSnapshot {
    pub uptime: Option<Duration>,
    pub entries_dispatched: u64,
    pub entries_queued: u64,
    pub entries_dropped: u64,
    pub transport_outputs: u64,
    pub transport_errors: u64,
    pub queue_flushes: u64,
    /// 传输提交成功率（百分比）
    pub success_rate_percent: f64,
}

impl Diagnostics {
    /// 创建新的诊断实例。
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn increment_entries_dispatched(&self) {
        self.entries_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_entries_queued(&self) {
        self.entries_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_entries_dropped(&self) {
        self.entries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_outputs(&self) {
        self.transport_outputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_errors(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 批量增加传输错误计数。
    pub fn add_transport_errors(&self, count: u64) {
        self.transport_errors.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_queue_flushes(&self) {
        self.queue_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取诊断数据的快照。
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let transport_outputs = self.transport_outputs.load(Ordering::Relaxed);
        let transport_errors = self.transport_errors.load(Ordering::Relaxed);

        let success_rate_percent = if transport_outputs + transport_errors > 0 {
            (transport_outputs as f64 / (transport_outputs + transport_errors) as f64) * 100.0
        } else {
            100.0
        };

        DiagnosticsSnapshot {
            uptime: self.start_time.map(|start| start.elapsed()),
            entries_dispatched: self.entries_dispatched.load(Ordering::Relaxed),
            entries_queued: self.entries_queued.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            transport_outputs,
            transport_errors,
            queue_flushes: self.queue_flushes.load(Ordering::Relaxed),
            success_rate_percent,
        }
    }

    /// 重置所有计数器（主要用于测试）。
    pub fn reset(&self) {
        self.entries_dispatched.store(0, Ordering::Relaxed);
        self.entries_queued.store(0, Ordering::Relaxed);
        self.entries_dropped.store(0, Ordering::Relaxed);
        self.transport_outputs.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.queue_flushes.store(0, Ordering::Relaxed);
    }
}
