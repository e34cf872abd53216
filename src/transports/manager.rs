//! RelayLog Transport Manager
//!
//! 传输管理器负责多个输出目标的协调工作：
//! - 按注册顺序把条目扇出到所有已就绪的传输
//! - 维护每个传输的就绪状态与可选的阈值覆盖
//! - 批量生命周期：`start` 等待全部 setup，`stop` 先刷新再关闭，尽力而为
//!
//! 单个传输的 `output` 失败只会被记录和计数，不会阻断对其他传输的扇出。

use crate::core::entry::{Layout, LogEntry};
use crate::core::levels::Rank;
use crate::diagnostics::Diagnostics;
use crate::error::{RelayLogError, Result, TransportFailure};
use crate::transports::traits::Transport;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

/// 注册后返回的传输句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 传输槽位，用于在管理器中跟踪单个传输的状态
#[derive(Debug)]
struct Slot {
    id: TransportId,
    transport: Arc<dyn Transport>,
    ready: AtomicBool,
    threshold_override: RwLock<Option<Rank>>,
}

impl Slot {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn threshold_override(&self) -> Option<Rank> {
        *self
            .threshold_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 覆盖值与全局阈值中更严格的一个；覆盖只能收窄
    fn effective_threshold(&self, global: Rank) -> Rank {
        match self.threshold_override() {
            Some(threshold) => threshold.most_severe(global),
            None => global,
        }
    }

    /// 强制条目绕过全局阈值，但仍受覆盖值约束
    fn accepts(&self, entry: &LogEntry, global: Rank) -> bool {
        if entry.forced {
            return self
                .threshold_override()
                .map_or(true, |threshold| entry.rank.is_at_least_as_severe_as(threshold));
        }
        entry.rank.is_at_least_as_severe_as(self.effective_threshold(global))
    }
}

/// 传输管理器
#[derive(Debug)]
pub struct TransportManager {
    /// 注册顺序的槽位
    slots: RwLock<Vec<Arc<Slot>>>,
    /// 全局阈值
    threshold: RwLock<Rank>,
    /// 渲染布局
    layout: RwLock<Layout>,
    next_id: AtomicU64,
    diagnostics: Arc<Diagnostics>,
}

impl TransportManager {
    /// 创建新的传输管理器
    pub fn new(threshold: Rank, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            threshold: RwLock::new(threshold),
            layout: RwLock::new(Layout::default()),
            next_id: AtomicU64::new(1),
            diagnostics,
        }
    }

    fn snapshot(&self) -> Vec<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find(&self, id: TransportId) -> Option<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|slot| slot.id == id)
            .cloned()
    }

    /// 注册传输但不执行 setup；在 `start` 或 `setup_transport` 完成前不计入就绪
    pub fn register(&self, transport: Arc<dyn Transport>) -> TransportId {
        let id = TransportId(self.next_id.fetch_add(1, Ordering::Relaxed));
        transport.threshold_updated(self.threshold());

        let slot = Arc::new(Slot {
            id,
            transport,
            ready: AtomicBool::new(false),
            threshold_override: RwLock::new(None),
        });
        debug!("Registered transport '{}' as {}", slot.transport.name(), id);

        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slot);
        id
    }

    /// 注册传输并等待其 setup 完成
    ///
    /// setup 失败时传输会被移除，错误返回给调用方。
    pub async fn add(&self, transport: Arc<dyn Transport>) -> Result<TransportId> {
        let id = self.register(transport);
        self.setup_transport(id).await?;
        Ok(id)
    }

    /// 对已注册的传输执行 setup 并标记为就绪
    pub async fn setup_transport(&self, id: TransportId) -> Result<()> {
        let slot = self
            .find(id)
            .ok_or_else(|| RelayLogError::config(format!("Unknown transport {}", id)))?;
        self.setup_slot(&slot).await.map_err(RelayLogError::from)
    }

    async fn setup_slot(&self, slot: &Arc<Slot>) -> std::result::Result<(), TransportFailure> {
        if slot.is_ready() {
            return Ok(());
        }

        match slot.transport.setup().await {
            Ok(()) => {
                slot.ready.store(true, Ordering::Release);
                debug!("Transport '{}' is ready", slot.transport.name());
                Ok(())
            }
            Err(e) => {
                error!("Setup of transport '{}' failed: {}", slot.transport.name(), e);
                self.diagnostics.increment_transport_errors();
                self.unregister(slot.id);
                Err(TransportFailure::new(slot.transport.name(), e))
            }
        }
    }

    fn unregister(&self, id: TransportId) -> Option<Arc<Slot>> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let position = slots.iter().position(|slot| slot.id == id)?;
        Some(slots.remove(position))
    }

    /// 注销传输，不做隐式的刷新或关闭，生命周期由调用方负责
    pub fn remove(&self, id: TransportId) -> Option<Arc<dyn Transport>> {
        let slot = self.unregister(id)?;
        debug!("Removed transport '{}' ({})", slot.transport.name(), id);
        Some(slot.transport.clone())
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ready_count(&self) -> usize {
        self.snapshot().iter().filter(|slot| slot.is_ready()).count()
    }

    /// 所有已注册的传输是否都已就绪
    pub fn all_ready(&self) -> bool {
        self.snapshot().iter().all(|slot| slot.is_ready())
    }

    pub fn is_ready(&self, id: TransportId) -> bool {
        self.find(id).map(|slot| slot.is_ready()).unwrap_or(false)
    }

    /// 当前全局阈值
    pub fn threshold(&self) -> Rank {
        *self.threshold.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// 设置全局阈值并通知所有没有覆盖值的传输
    pub fn set_threshold(&self, threshold: Rank) {
        *self.threshold.write().unwrap_or_else(PoisonError::into_inner) = threshold;
        for slot in self.snapshot() {
            if slot.threshold_override().is_none() {
                slot.transport.threshold_updated(threshold);
            }
        }
    }

    /// 设置或清除单个传输的阈值覆盖
    pub fn set_override(&self, id: TransportId, threshold: Option<Rank>) -> Result<()> {
        let slot = self
            .find(id)
            .ok_or_else(|| RelayLogError::config(format!("Unknown transport {}", id)))?;
        *slot
            .threshold_override
            .write()
            .unwrap_or_else(PoisonError::into_inner) = threshold;
        if threshold.is_none() {
            slot.transport.threshold_updated(self.threshold());
        }
        Ok(())
    }

    pub fn threshold_override(&self, id: TransportId) -> Option<Rank> {
        self.find(id).and_then(|slot| slot.threshold_override())
    }

    pub fn layout(&self) -> Layout {
        self.layout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_layout(&self, layout: Layout) {
        *self.layout.write().unwrap_or_else(PoisonError::into_inner) = layout;
    }

    /// 是否至少有一个已注册传输（不论是否就绪）会接受该 rank
    ///
    /// 没有任何注册传输时退化为全局阈值判断，使条目可以在首个传输注册前排队。
    pub fn meets_any_threshold_value(&self, rank: Rank) -> bool {
        let global = self.threshold();
        let slots = self.snapshot();
        if slots.is_empty() {
            return rank.is_at_least_as_severe_as(global);
        }
        slots
            .iter()
            .any(|slot| rank.is_at_least_as_severe_as(slot.effective_threshold(global)))
    }

    /// 按注册顺序把条目提交给每个接受它的已就绪传输
    ///
    /// 每个条目在每种样式下最多渲染一次。返回成功提交的传输数量。
    pub fn emit(&self, entry: &LogEntry) -> usize {
        let global = self.threshold();
        let layout = self.layout.read().unwrap_or_else(PoisonError::into_inner);
        let mut plain: Option<String> = None;
        let mut styled: Option<String> = None;
        let mut delivered = 0;

        self.diagnostics.increment_entries_dispatched();

        for slot in self.snapshot() {
            if !slot.is_ready() {
                continue;
            }
            if !slot.accepts(entry, global) {
                continue;
            }

            let rendered = if slot.transport.wants_style() {
                styled.get_or_insert_with(|| layout.render(entry, true))
            } else {
                plain.get_or_insert_with(|| layout.render(entry, false))
            };

            match slot.transport.output(entry, rendered, entry.rank) {
                Ok(()) => {
                    delivered += 1;
                    self.diagnostics.increment_transport_outputs();
                }
                Err(e) => {
                    warn!("Transport '{}' output error: {}", slot.transport.name(), e);
                    self.diagnostics.increment_transport_errors();
                }
            }
        }

        delivered
    }

    /// 对所有未就绪的传输执行 setup
    ///
    /// 失败的传输会被移除，所有失败在全部尝试后汇总返回。
    pub async fn start(&self) -> Result<()> {
        let mut failures = Vec::new();
        for slot in self.snapshot() {
            if let Err(failure) = self.setup_slot(&slot).await {
                failures.push(failure);
            }
        }
        debug!(
            "Transport manager started: {}/{} ready",
            self.ready_count(),
            self.len()
        );
        RelayLogError::from_failures(failures)
    }

    /// 刷新所有已就绪的传输
    pub async fn flush_all(&self) -> Result<()> {
        let mut failures = Vec::new();
        for slot in self.snapshot() {
            if !slot.is_ready() {
                continue;
            }
            if let Err(e) = slot.transport.flush().await {
                warn!("Error flushing transport '{}': {}", slot.transport.name(), e);
                failures.push(TransportFailure::new(slot.transport.name(), e));
            }
        }
        self.diagnostics.add_transport_errors(failures.len() as u64);
        RelayLogError::from_failures(failures)
    }

    /// 先刷新再关闭所有传输，尽力而为
    ///
    /// 任一传输的失败都不会阻止对其余传输的尝试；失败在全部尝试后汇总返回。
    /// 关闭后的传输保持注册但不再就绪，再次 `start` 会重新 setup。
    pub async fn stop(&self) -> Result<()> {
        debug!("Stopping transport manager");
        let slots = self.snapshot();
        let mut failures = Vec::new();

        for slot in slots.iter().filter(|slot| slot.is_ready()) {
            if let Err(e) = slot.transport.flush().await {
                warn!("Error flushing transport '{}': {}", slot.transport.name(), e);
                failures.push(TransportFailure::new(slot.transport.name(), e));
            }
        }

        for slot in slots.iter() {
            slot.ready.store(false, Ordering::Release);
            if let Err(e) = slot.transport.close().await {
                error!("Error closing transport '{}': {}", slot.transport.name(), e);
                failures.push(TransportFailure::new(slot.transport.name(), e));
            }
        }

        self.diagnostics.add_transport_errors(failures.len() as u64);
        debug!("Transport manager stopped with {} failure(s)", failures.len());
        RelayLogError::from_failures(failures)
    }
}
