//! 日志管理器
//!
//! `LogManager` 持有级别注册表、根日志器、待发送队列和传输管理器，
//! 并驱动整个生命周期：
//!
//! ```text
//! Uninitialized -> Initialized -> Running -> Stopped
//!                                    ^          |
//!                                    +----------+
//! ```
//!
//! 首次请求日志器时会以 `LevelProfile::Standard` 惰性初始化。重新初始化会先排空
//! 队列，剩余条目按级别名称在新注册表中重新解析，无法解析的条目被丢弃并计数。

use crate::config::RelayLogConfig;
use crate::core::emitter::FlushCallback;
use crate::core::entry::{Layout, LogEntry, ShowOptions, TimestampMode};
use crate::core::levels::{LevelDefinition, LevelProfile, LevelRegistry, LevelSelector, Rank};
use crate::core::logger::Logger;
use crate::core::queue::PendingQueue;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::error::{RelayLogError, Result};
use crate::transports::manager::{TransportId, TransportManager};
use crate::transports::null::NullTransport;
use crate::transports::traits::Transport;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// 管理器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::Initialized => "initialized",
            ManagerState::Running => "running",
            ManagerState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// 日志器与管理器共享的管道
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub(crate) registry: RwLock<Option<Arc<LevelRegistry>>>,
    pub(crate) transports: Arc<TransportManager>,
    pub(crate) queue: Arc<PendingQueue>,
    pub(crate) diagnostics: Arc<Diagnostics>,
}

impl Pipeline {
    fn new() -> Self {
        let diagnostics = Arc::new(Diagnostics::new());
        // 注册表建立前的占位阈值，初始化时替换
        let transports = Arc::new(TransportManager::new(Rank(0), diagnostics.clone()));
        let queue = Arc::new(PendingQueue::new(transports.clone(), diagnostics.clone()));
        Self {
            registry: RwLock::new(None),
            transports,
            queue,
            diagnostics,
        }
    }

    pub(crate) fn registry(&self) -> Result<Arc<LevelRegistry>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RelayLogError::NotInitialized)
    }

    fn is_initialized(&self) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn flush_callback(&self) -> FlushCallback {
        let queue = self.queue.clone();
        Arc::new(move || {
            queue.flush();
        })
    }
}

/// 日志管理器
pub struct LogManager {
    pipeline: Arc<Pipeline>,
    state: RwLock<ManagerState>,
    root: RwLock<Option<Logger>>,
    show: RwLock<ShowOptions>,
    fallback: Arc<dyn Transport>,
    started_at: DateTime<Utc>,
    init_lock: Mutex<()>,
}

impl fmt::Debug for LogManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogManager")
            .field("state", &self.state())
            .field("transports", &self.pipeline.transports.len())
            .field("pending", &self.pipeline.queue.len())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(Arc::new(NullTransport))
    }
}

impl LogManager {
    /// 创建管理器；`fallback` 在启动时没有任何注册传输的情况下使用
    pub fn new(fallback: Arc<dyn Transport>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::new()),
            state: RwLock::new(ManagerState::Uninitialized),
            root: RwLock::new(None),
            show: RwLock::new(ShowOptions::default()),
            fallback,
            started_at: Utc::now(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ManagerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ManagerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_initialized()
    }

    /// 当前注册表；初始化前返回 `NotInitialized`
    pub fn registry(&self) -> Result<Arc<LevelRegistry>> {
        self.pipeline.registry()
    }

    /// 以内置配置档初始化
    pub fn init(&self, profile: LevelProfile) -> Result<()> {
        self.init_with_levels(profile.definitions())
    }

    /// 以自定义级别集合初始化
    ///
    /// 已初始化时替换注册表，队列中的条目按名称重新解析。
    pub fn init_with_levels(&self, definitions: Vec<LevelDefinition>) -> Result<()> {
        let registry = LevelRegistry::new(definitions)?;
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.install_registry(registry)
    }

    /// 未初始化时以 `LevelProfile::Standard` 初始化
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_initialized() {
            return Ok(());
        }
        self.install_registry(LevelRegistry::from_profile(LevelProfile::Standard)?)
    }

    fn install_registry(&self, registry: LevelRegistry) -> Result<()> {
        let registry = Arc::new(registry);
        let previous = self
            .pipeline
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let threshold = match previous {
            Some(old) => {
                self.pipeline.queue.flush();
                let dropped = self.reresolve_pending(&registry);
                if dropped > 0 {
                    warn!(
                        "Dropped {} pending entries with levels unknown to the new registry",
                        dropped
                    );
                }
                old.as_name(self.pipeline.transports.threshold())
                    .ok()
                    .and_then(|name| registry.as_rank(name).ok())
                    .unwrap_or_else(|| registry.default_rank())
            }
            None => registry.default_rank(),
        };

        *self
            .pipeline
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(registry.clone());
        self.pipeline.transports.set_threshold(threshold);

        {
            let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
            let logger = match root.take() {
                Some(logger) => {
                    let kept = logger
                        .threshold()
                        .filter(|name| registry.contains(*name))
                        .map(str::to_string);
                    logger.with_threshold_name(kept)
                }
                None => Logger::root(self.pipeline.clone()),
            };
            *root = Some(logger);
        }

        if self.state() == ManagerState::Uninitialized {
            self.set_state(ManagerState::Initialized);
        }
        self.refresh_layout(&registry);
        debug!(
            "Level registry installed with {} levels, threshold {}",
            registry.definitions().len(),
            registry.as_name(threshold).unwrap_or("?")
        );

        self.pipeline.queue.flush();
        Ok(())
    }

    fn reresolve_pending(&self, registry: &LevelRegistry) -> usize {
        let diagnostics = self.pipeline.diagnostics.clone();
        self.pipeline
            .queue
            .retain_map(|mut entry| match registry.definition(entry.level.as_str()) {
                Ok(definition) => {
                    entry.level = definition.name.clone();
                    entry.rank = definition.rank;
                    Some(entry)
                }
                Err(_) => {
                    debug!("Dropping pending entry at unknown level '{}'", entry.level);
                    diagnostics.increment_entries_dropped();
                    None
                }
            })
    }

    fn refresh_layout(&self, registry: &LevelRegistry) {
        let threshold = self.pipeline.transports.threshold();
        let level_width = registry
            .max_width(threshold)
            .or_else(|_| registry.max_width(registry.lowest_level_name()))
            .unwrap_or(0);
        let styles = registry
            .definitions()
            .iter()
            .filter_map(|definition| definition.style.map(|style| (definition.name.clone(), style)))
            .collect();

        self.pipeline.transports.set_layout(Layout {
            show: *self.show.read().unwrap_or_else(PoisonError::into_inner),
            level_width,
            styles,
            started_at: self.started_at,
        });
    }

    /// 根日志器；未初始化时惰性初始化
    pub fn logger(&self) -> Result<Logger> {
        self.ensure_initialized()?;
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| RelayLogError::internal("root logger missing after initialization"))
    }

    /// 当前全局阈值的级别名称
    pub fn threshold(&self) -> Result<String> {
        let registry = self.registry()?;
        Ok(registry
            .as_name(self.pipeline.transports.threshold())?
            .to_string())
    }

    /// 设置全局阈值
    ///
    /// 比根日志器阈值更宽松时不会被拒绝，而是强制输出一条警告。
    pub fn set_threshold<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<()> {
        let registry = self.registry()?;
        let rank = registry.as_rank(level)?;
        self.pipeline.transports.set_threshold(rank);
        self.refresh_layout(&registry);

        if let Some(root_threshold) = self.root_threshold() {
            if let Ok(root_rank) = registry.as_rank(root_threshold.as_str()) {
                if !rank.is_at_least_as_severe_as(root_rank) {
                    self.warn_forced(
                        &registry,
                        format!(
                            "Global threshold {} is less restrictive than the root logger threshold {}",
                            registry.as_name(rank)?,
                            root_threshold
                        ),
                    )?;
                }
            }
        }

        self.pipeline.queue.flush();
        Ok(())
    }

    fn warn_forced(&self, registry: &LevelRegistry, message: String) -> Result<()> {
        let level = registry
            .warn_level_name()
            .unwrap_or_else(|| registry.default_level_name());
        let rank = registry.as_rank(level)?;
        self.pipeline
            .queue
            .submit(LogEntry::new(level, rank, message).forced());
        Ok(())
    }

    /// 根日志器的阈值名称
    pub fn root_threshold(&self) -> Option<String> {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|logger| logger.threshold().map(str::to_string))
    }

    /// 设置根日志器阈值；之后请求的日志器继承该阈值
    pub fn set_root_threshold<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<()> {
        let registry = self.registry()?;
        let name = registry.definition(level)?.name.clone();
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let logger = root.take().unwrap_or_else(|| Logger::root(self.pipeline.clone()));
        *root = Some(logger.with_threshold_name(Some(name)));
        Ok(())
    }

    /// 提交一个现成的条目
    ///
    /// 级别按名称在注册表中解析，未知级别返回 `UnknownLevel`。
    /// 返回 `false` 表示条目未通过阈值检查。
    pub fn emit(&self, mut entry: LogEntry) -> Result<bool> {
        let registry = self.registry()?;
        let definition = registry.definition(entry.level.as_str())?;
        entry.level = definition.name.clone();
        entry.rank = definition.rank;

        if !entry.forced && !self.pipeline.transports.meets_any_threshold_value(entry.rank) {
            return Ok(false);
        }

        let flush = definition.flush_trigger;
        self.pipeline.queue.submit(entry);
        if flush {
            self.flush_queue();
        }
        Ok(true)
    }

    /// 排空待发送队列；条件不满足时是无操作
    pub fn flush_queue(&self) -> usize {
        self.pipeline.queue.flush()
    }

    pub fn pending(&self) -> usize {
        self.pipeline.queue.len()
    }

    /// 注册传输并等待 setup，随后尝试排空队列
    pub async fn add_transport(&self, transport: Arc<dyn Transport>) -> Result<TransportId> {
        let id = self.pipeline.transports.add(transport).await?;
        self.flush_queue();
        Ok(id)
    }

    /// 注册传输但延迟 setup 到 `start`
    pub fn register_transport(&self, transport: Arc<dyn Transport>) -> TransportId {
        self.pipeline.transports.register(transport)
    }

    /// 注销传输，生命周期由调用方负责
    pub fn remove_transport(&self, id: TransportId) -> Option<Arc<dyn Transport>> {
        let removed = self.pipeline.transports.remove(id);
        self.flush_queue();
        removed
    }

    /// 设置或清除单个传输的阈值覆盖
    pub fn set_transport_threshold<'a>(
        &self,
        id: TransportId,
        level: Option<LevelSelector<'a>>,
    ) -> Result<()> {
        let threshold = match level {
            Some(level) => Some(self.registry()?.as_rank(level)?),
            None => None,
        };
        self.pipeline.transports.set_override(id, threshold)
    }

    pub fn transport_manager(&self) -> &Arc<TransportManager> {
        &self.pipeline.transports
    }

    /// 启动所有传输并排空队列
    ///
    /// 没有任何注册传输时使用回退传输。setup 失败的传输被移除，
    /// 其余传输照常启动，失败汇总返回；全部失败时同样改用回退传输。
    pub async fn start(&self) -> Result<()> {
        self.ensure_initialized()?;
        if self.pipeline.transports.is_empty() {
            debug!("No transport registered, using fallback '{}'", self.fallback.name());
            self.pipeline.transports.register(self.fallback.clone());
        }

        let result = self.pipeline.transports.start().await;
        if self.pipeline.transports.is_empty() {
            warn!(
                "Every transport failed setup, using fallback '{}'",
                self.fallback.name()
            );
            if let Err(e) = self.pipeline.transports.add(self.fallback.clone()).await {
                warn!("Fallback transport failed setup: {}", e);
            }
        }
        self.pipeline.queue.set_running(true);
        self.set_state(ManagerState::Running);
        let drained = self.flush_queue();
        info!(
            "Log manager running with {} transport(s), drained {} pending entries",
            self.pipeline.transports.ready_count(),
            drained
        );
        result
    }

    /// 排空队列后停止所有传输
    ///
    /// 之后提交的条目进入队列而不是被丢弃。
    pub async fn stop(&self) -> Result<()> {
        self.flush_queue();
        self.pipeline.queue.set_running(false);
        if self.state() != ManagerState::Uninitialized {
            self.set_state(ManagerState::Stopped);
        }
        let result = self.pipeline.transports.stop().await;
        info!(
            "Log manager stopped, {} entries pending",
            self.pipeline.queue.len()
        );
        result
    }

    pub async fn close(&self) -> Result<()> {
        self.stop().await
    }

    pub fn show_options(&self) -> ShowOptions {
        *self.show.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_show<F: FnOnce(&mut ShowOptions)>(&self, update: F) -> Result<()> {
        let registry = self.registry()?;
        update(&mut self.show.write().unwrap_or_else(PoisonError::into_inner));
        self.refresh_layout(&registry);
        Ok(())
    }

    pub fn set_show_level(&self, show: bool) -> Result<()> {
        self.update_show(|options| options.level = show)
    }

    pub fn set_show_timestamp(&self, mode: TimestampMode) -> Result<()> {
        self.update_show(|options| options.timestamp = mode)
    }

    pub fn set_show_data(&self, show: bool) -> Result<()> {
        self.update_show(|options| options.data = show)
    }

    pub fn queue_capacity(&self) -> usize {
        self.pipeline.queue.capacity()
    }

    /// 调整待发送队列容量，超出部分从最旧的条目开始淘汰
    pub fn set_queue_capacity(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(RelayLogError::config("queue capacity must be greater than 0"));
        }
        self.pipeline.queue.set_capacity(capacity);
        Ok(())
    }

    /// 应用配置中的配置档、阈值、队列容量与显示选项
    pub fn apply_config(&self, config: &RelayLogConfig) -> Result<()> {
        if !self.is_initialized() {
            self.init(config.profile)?;
        }
        self.set_queue_capacity(config.queue_capacity)?;
        self.set_show_level(config.show_level)?;
        self.set_show_timestamp(config.show_timestamp)?;
        self.set_show_data(config.show_data)?;
        self.set_threshold(config.threshold.as_str())
    }

    pub fn stats(&self) -> DiagnosticsSnapshot {
        self.pipeline.diagnostics.snapshot()
    }
}
