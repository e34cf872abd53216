//! 日志器
//!
//! `Logger` 是一个不可变的上下文快照：子日志器和带会话/请求 ID 的日志器都是
//! 复制字段后构建的新值，父日志器之后的变化不会影响已创建的子日志器。
//!
//! 每次取级别（`info()`、`level(..)`、`at(..)`）都返回新的 `MessageBuilder`，
//! 其终结操作 `emit` 消耗自身，因此同一个构建器不可能被重复提交。

use crate::core::emitter::{
    ContextEmitter, ElapsedResolver, EntryContext, EntryResult, Thresholds,
};
use crate::core::entry::{EntryData, Payload};
use crate::core::levels::{LevelSelector, StandardLevel};
use crate::core::manager::Pipeline;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// 性能标记表
#[derive(Debug, Default)]
pub struct PerfMarks {
    marks: Mutex<HashMap<String, Instant>>,
}

impl PerfMarks {
    pub fn mark<S: Into<String>>(&self, id: S) {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), Instant::now());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl ElapsedResolver for PerfMarks {
    fn elapsed_since(&self, mark: &str, keep: bool) -> Duration {
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        let started = if keep {
            marks.get(mark).copied()
        } else {
            marks.remove(mark)
        };
        started.map(|instant| instant.elapsed()).unwrap_or(Duration::ZERO)
    }
}

/// 日志器
#[derive(Clone)]
pub struct Logger {
    pipeline: Arc<Pipeline>,
    context: Arc<EntryContext>,
    /// 日志器级阈值（规范化级别名称）
    threshold: Option<String>,
    marks: Arc<PerfMarks>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("context", &self.context)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl Logger {
    pub(crate) fn root(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            context: Arc::new(EntryContext::default()),
            threshold: None,
            marks: Arc::new(PerfMarks::default()),
        }
    }

    fn derive(&self, context: EntryContext) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            context: Arc::new(context),
            threshold: self.threshold.clone(),
            marks: self.marks.clone(),
        }
    }

    pub fn context(&self) -> &EntryContext {
        &self.context
    }

    pub fn sid(&self) -> Option<&str> {
        self.context.sid.as_deref()
    }

    pub fn req_id(&self) -> Option<&str> {
        self.context.req_id.as_deref()
    }

    pub fn pkg(&self) -> Option<&str> {
        self.context.pkg.as_deref()
    }

    pub fn threshold(&self) -> Option<&str> {
        self.threshold.as_deref()
    }

    /// 子日志器：包路径追加一段，性能标记表独立
    pub fn child(&self, pkg: &str) -> Logger {
        let pkg = match self.context.pkg {
            Some(ref parent) => format!("{}/{}", parent, pkg),
            None => pkg.to_string(),
        };
        let mut logger = self.derive(EntryContext {
            pkg: Some(pkg),
            ..(*self.context).clone()
        });
        logger.marks = Arc::new(PerfMarks::default());
        logger
    }

    pub fn with_session<S: Into<String>>(&self, sid: S) -> Logger {
        self.derive(EntryContext {
            sid: Some(sid.into()),
            ..(*self.context).clone()
        })
    }

    pub fn with_request<S: Into<String>>(&self, req_id: S) -> Logger {
        self.derive(EntryContext {
            req_id: Some(req_id.into()),
            ..(*self.context).clone()
        })
    }

    /// 设置日志器级阈值，级别未知时返回 `UnknownLevel`
    pub fn with_threshold<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<Logger> {
        let registry = self.pipeline.registry()?;
        let name = registry.definition(level)?.name.clone();
        Ok(self.with_threshold_name(Some(name)))
    }

    pub fn without_threshold(&self) -> Logger {
        self.with_threshold_name(None)
    }

    pub(crate) fn with_threshold_name(&self, threshold: Option<String>) -> Logger {
        let mut logger = self.derive((*self.context).clone());
        logger.threshold = threshold;
        logger
    }

    /// 为某个级别构建上下文发射器
    pub fn emitter<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<ContextEmitter> {
        let registry = self.pipeline.registry()?;
        let definition = registry.definition(level)?;
        let rank = definition.rank;

        // 注册表替换后不再认识的日志器阈值不参与过滤
        let within_logger = match self.threshold.as_deref() {
            Some(name) => registry
                .as_rank(name)
                .map(|limit| rank.is_at_least_as_severe_as(limit))
                .unwrap_or(true),
            None => true,
        };

        let thresholds = Thresholds {
            meets_threshold: within_logger
                && self.pipeline.transports.meets_any_threshold_value(rank),
            meets_flush_threshold: definition.flush_trigger,
        };

        Ok(ContextEmitter::new(
            definition.name.clone(),
            rank,
            self.pipeline.queue.clone(),
            (*self.context).clone(),
            thresholds,
        )
        .with_flush_callback(self.pipeline.flush_callback())
        .with_elapsed_resolver(self.marks.clone()))
    }

    /// 按名称取级别；名称未知时立即失败
    pub fn at(&self, name: &str) -> Result<MessageBuilder> {
        self.emitter(name).map(MessageBuilder::new)
    }

    /// 按内置级别取构建器；当前注册表没有该级别时错误延迟到 `emit`
    pub fn level(&self, level: StandardLevel) -> MessageBuilder {
        MessageBuilder::from_result(self.emitter(level))
    }

    pub fn fatal(&self) -> MessageBuilder {
        self.level(StandardLevel::Fatal)
    }

    pub fn critical(&self) -> MessageBuilder {
        self.level(StandardLevel::Critical)
    }

    pub fn error(&self) -> MessageBuilder {
        self.level(StandardLevel::Error)
    }

    pub fn warn(&self) -> MessageBuilder {
        self.level(StandardLevel::Warn)
    }

    pub fn info(&self) -> MessageBuilder {
        self.level(StandardLevel::Info)
    }

    pub fn debug(&self) -> MessageBuilder {
        self.level(StandardLevel::Debug)
    }

    pub fn trace(&self) -> MessageBuilder {
        self.level(StandardLevel::Trace)
    }

    /// 直接提交一条文本消息
    pub fn log<'a>(
        &self,
        level: impl Into<LevelSelector<'a>>,
        message: impl Into<Payload>,
    ) -> Result<EntryResult> {
        Ok(self.emitter(level)?.emit(message))
    }

    /// 该级别的消息是否会被接受
    pub fn is_enabled<'a>(&self, level: impl Into<LevelSelector<'a>>) -> bool {
        self.emitter(level)
            .map(|emitter| emitter.emit_enabled())
            .unwrap_or(false)
    }

    pub fn mark<S: Into<String>>(&self, id: S) {
        self.marks.mark(id);
    }

    /// 距离性能标记经过的时间；`keep` 为 false 时移除标记
    pub fn elapsed_since(&self, id: &str, keep: bool) -> Duration {
        self.marks.elapsed_since(id, keep)
    }
}

/// 消息构建器
///
/// 可变累加器，终结操作 `emit` 消耗自身。
#[must_use = "a MessageBuilder does nothing until `emit` is called"]
#[derive(Debug)]
pub struct MessageBuilder {
    emitter: Result<ContextEmitter>,
    message: Option<Payload>,
    data: EntryData,
}

impl MessageBuilder {
    fn new(emitter: ContextEmitter) -> Self {
        Self::from_result(Ok(emitter))
    }

    fn from_result(emitter: Result<ContextEmitter>) -> Self {
        Self {
            emitter,
            message: None,
            data: EntryData::new(),
        }
    }

    /// 消息是否会被接受；为 false 时可以跳过昂贵的格式化
    pub fn is_enabled(&self) -> bool {
        self.emitter
            .as_ref()
            .map(|emitter| emitter.emit_enabled())
            .unwrap_or(false)
    }

    pub fn message(mut self, message: impl Into<Payload>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 追加一个结构化字段；消息会被丢弃时不做序列化
    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        let data_enabled = self
            .emitter
            .as_ref()
            .map(|emitter| emitter.data_enabled())
            .unwrap_or(false);
        if data_enabled {
            let value = serde_json::to_value(value)
                .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {}>", e)));
            self.data.insert(key.into(), value);
        }
        self
    }

    pub fn data(mut self, data: EntryData) -> Self {
        self.data.extend(data);
        self
    }

    /// 提交消息
    ///
    /// 级别在当前注册表中不存在时返回 `UnknownLevel`。
    pub fn emit(self) -> Result<EntryResult> {
        let emitter = self.emitter?;
        let message = self.message.unwrap_or_else(|| Payload::Text(String::new()));
        let data = if self.data.is_empty() {
            None
        } else {
            Some(self.data)
        };
        Ok(emitter.emit_with_data(message, data))
    }
}
