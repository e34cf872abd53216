//! 待发送队列
//!
//! 传输尚未全部就绪或管理器未运行时，条目在此按 FIFO 缓存。
//! "直接分发还是入队" 的判断和每次排空都在同一把锁内完成，
//! 因此它也是多线程下扇出的唯一串行化点：只有在队列为空、管理器运行中、
//! 且所有已注册传输都就绪时才会直接分发，保证跨线程的提交顺序。
//!
//! 队列有容量上限；满时淘汰最旧的条目并计入 `entries_dropped`。

use crate::core::entry::LogEntry;
use crate::diagnostics::Diagnostics;
use crate::transports::manager::TransportManager;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// 默认队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// 已直接扇出，携带成功提交的传输数量
    Dispatched(usize),
    /// 已进入待发送队列
    Queued,
}

#[derive(Debug)]
struct QueueState {
    entries: VecDeque<LogEntry>,
    running: bool,
    capacity: usize,
    // 上次告警后的淘汰数，避免每条都告警
    evicted_since_warn: u64,
}

/// 待发送队列
#[derive(Debug)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
    transports: Arc<TransportManager>,
    diagnostics: Arc<Diagnostics>,
}

impl PendingQueue {
    pub fn new(transports: Arc<TransportManager>, diagnostics: Arc<Diagnostics>) -> Self {
        Self::with_capacity(transports, diagnostics, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        transports: Arc<TransportManager>,
        diagnostics: Arc<Diagnostics>,
        capacity: usize,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                running: false,
                capacity: capacity.max(1),
                evicted_since_warn: 0,
            }),
            transports,
            diagnostics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 至少注册了一个传输且全部就绪
    fn deliverable(&self) -> bool {
        !self.transports.is_empty() && self.transports.all_ready()
    }

    /// 提交条目：满足条件时直接扇出，否则入队
    pub fn submit(&self, entry: LogEntry) -> Submission {
        let mut state = self.lock();
        if state.running && state.entries.is_empty() && self.deliverable() {
            return Submission::Dispatched(self.transports.emit(&entry));
        }

        if state.entries.len() >= state.capacity {
            state.entries.pop_front();
            self.record_eviction(&mut state);
        }
        state.entries.push_back(entry);
        self.diagnostics.increment_entries_queued();
        Submission::Queued
    }

    fn record_eviction(&self, state: &mut QueueState) {
        self.diagnostics.increment_entries_dropped();
        if state.evicted_since_warn == 0 {
            warn!(
                "Pending queue full ({} entries), dropping oldest entries",
                state.capacity
            );
        }
        state.evicted_since_warn += 1;
    }

    /// 按 FIFO 排空队列，直到队列为空或条件不再满足
    ///
    /// 可在任何状态变化后推测性调用；不满足条件时是无操作。返回本次分发的条目数。
    pub fn flush(&self) -> usize {
        let mut state = self.lock();
        let mut drained = 0;

        while state.running && self.deliverable() {
            let Some(entry) = state.entries.pop_front() else {
                break;
            };
            self.transports.emit(&entry);
            drained += 1;
        }

        if drained > 0 {
            if state.evicted_since_warn > 0 {
                warn!(
                    "{} entries were dropped while the pending queue was full",
                    state.evicted_since_warn
                );
                state.evicted_since_warn = 0;
            }
            self.diagnostics.increment_queue_flushes();
            debug!("Drained {} pending entries", drained);
        }
        drained
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// 调整容量；超出部分从最旧的条目开始淘汰，返回淘汰数
    pub fn set_capacity(&self, capacity: usize) -> usize {
        let mut state = self.lock();
        state.capacity = capacity.max(1);
        let mut evicted = 0;
        while state.entries.len() > state.capacity {
            state.entries.pop_front();
            self.record_eviction(&mut state);
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 在锁内改写所有待发送条目；返回 `None` 的条目被移除
    ///
    /// 用于注册表替换时按新注册表重新解析队列中的条目。
    pub fn retain_map<F>(&self, mut f: F) -> usize
    where
        F: FnMut(LogEntry) -> Option<LogEntry>,
    {
        let mut state = self.lock();
        let before = state.entries.len();
        let entries = std::mem::take(&mut state.entries);
        state.entries = entries.into_iter().filter_map(&mut f).collect();
        before - state.entries.len()
    }
}
