//! 上下文发射器
//!
//! 每条逻辑消息对应一个 `ContextEmitter`：构造时捕获日志器的上下文快照
//! （会话 ID、请求 ID、包路径）以及阈值判断结果，之后只读。
//! `emit` 把负载与快照组装成 `LogEntry` 并交给扇出入口。

use crate::core::entry::{EntryData, LogEntry, Payload};
use crate::core::levels::Rank;
use crate::core::queue::{PendingQueue, Submission};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 高严重级别条目提交后同步调用的刷新回调
pub type FlushCallback = Arc<dyn Fn() + Send + Sync>;

/// 计算距离某个性能标记经过的时间
pub trait ElapsedResolver: Send + Sync {
    /// `keep` 为 false 时移除该标记；标记不存在时返回零
    fn elapsed_since(&self, mark: &str, keep: bool) -> Duration;
}

/// 条目携带的上下文快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryContext {
    pub sid: Option<String>,
    pub req_id: Option<String>,
    pub pkg: Option<String>,
}

/// 构造时计算好的阈值判断
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub meets_threshold: bool,
    pub meets_flush_threshold: bool,
}

/// `emit` 的结果；低于阈值时为空
#[derive(Debug, Clone, Default)]
pub struct EntryResult {
    entry: Option<LogEntry>,
    submission: Option<Submission>,
}

impl EntryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// 已提交的条目
    pub fn entry(&self) -> Option<&LogEntry> {
        self.entry.as_ref()
    }

    pub fn submission(&self) -> Option<Submission> {
        self.submission
    }

    pub fn was_queued(&self) -> bool {
        self.submission == Some(Submission::Queued)
    }
}

/// 上下文发射器
pub struct ContextEmitter {
    level: String,
    rank: Rank,
    dispatch: Arc<PendingQueue>,
    context: EntryContext,
    thresholds: Thresholds,
    flush_callback: Option<FlushCallback>,
    elapsed_resolver: Option<Arc<dyn ElapsedResolver>>,
}

impl fmt::Debug for ContextEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextEmitter")
            .field("level", &self.level)
            .field("rank", &self.rank)
            .field("context", &self.context)
            .field("thresholds", &self.thresholds)
            .field("has_flush_callback", &self.flush_callback.is_some())
            .field("has_elapsed_resolver", &self.elapsed_resolver.is_some())
            .finish()
    }
}

impl ContextEmitter {
    pub fn new<S: Into<String>>(
        level: S,
        rank: Rank,
        dispatch: Arc<PendingQueue>,
        context: EntryContext,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            level: level.into(),
            rank,
            dispatch,
            context,
            thresholds,
            flush_callback: None,
            elapsed_resolver: None,
        }
    }

    pub fn with_flush_callback(mut self, callback: FlushCallback) -> Self {
        self.flush_callback = Some(callback);
        self
    }

    pub fn with_elapsed_resolver(mut self, resolver: Arc<dyn ElapsedResolver>) -> Self {
        self.elapsed_resolver = Some(resolver);
        self
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn context(&self) -> &EntryContext {
        &self.context
    }

    /// 是否值得序列化结构化数据
    pub fn data_enabled(&self) -> bool {
        self.thresholds.meets_threshold
    }

    pub fn emit_enabled(&self) -> bool {
        self.thresholds.meets_threshold
    }

    /// 是否值得采集调用栈
    pub fn stack_enabled(&self) -> bool {
        self.thresholds.meets_threshold
    }

    pub fn meets_flush_threshold(&self) -> bool {
        self.thresholds.meets_flush_threshold
    }

    /// 提交一条消息
    pub fn emit(&self, payload: impl Into<Payload>) -> EntryResult {
        self.emit_with_data(payload, None)
    }

    /// 提交一条带结构化数据的消息
    ///
    /// 低于阈值时返回空结果且不做任何 I/O。每次调用都会产生独立的条目。
    pub fn emit_with_data(&self, payload: impl Into<Payload>, data: Option<EntryData>) -> EntryResult {
        if !self.thresholds.meets_threshold {
            return EntryResult::empty();
        }

        let mut entry = LogEntry::new(self.level.clone(), self.rank, payload);
        entry.sid = self.context.sid.clone();
        entry.req_id = self.context.req_id.clone();
        entry.pkg = self.context.pkg.clone();
        entry.data = data;

        let receipt = entry.clone();
        let submission = self.dispatch.submit(entry);

        if self.thresholds.meets_flush_threshold {
            if let Some(ref callback) = self.flush_callback {
                callback();
            }
        }

        EntryResult {
            entry: Some(receipt),
            submission: Some(submission),
        }
    }

    /// 距离某个性能标记经过的时间；没有解析器时返回零
    pub fn elapsed_since(&self, mark: &str, keep: bool) -> Duration {
        self.elapsed_resolver
            .as_ref()
            .map(|resolver| resolver.elapsed_since(mark, keep))
            .unwrap_or(Duration::ZERO)
    }
}
