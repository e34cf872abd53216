//! tracing 桥接层
//!
//! `RelayLayer` 把 `tracing` 事件按级别名称转换为 `LogEntry` 并提交给
//! `LogManager`。事件的 target 作为包路径，`message` 字段作为消息，
//! 其余字段作为结构化数据。
//!
//! 本库自身的诊断事件（target 以 `relay_log` 开头）会被跳过，
//! 避免在扇出过程中重入管道。

use crate::core::entry::{EntryData, LogEntry};
use crate::core::levels::{Rank, StandardLevel};
use crate::core::manager::LogManager;
use serde_json::Value;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::Event;
use tracing_subscriber::layer::{Context, Layer};

const OWN_TARGET: &str = "relay_log";

/// 把 tracing 事件转发到 `LogManager` 的订阅层
#[derive(Debug, Clone)]
pub struct RelayLayer {
    manager: Arc<LogManager>,
}

impl RelayLayer {
    pub fn new(manager: Arc<LogManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<LogManager> {
        &self.manager
    }

    fn forward(&self, event: &Event<'_>) -> crate::Result<()> {
        let metadata = event.metadata();
        self.manager.ensure_initialized()?;

        let level = StandardLevel::from_tracing(metadata.level()).name();
        // 当前配置档中没有对应级别的事件不转发
        if !self.manager.registry()?.contains(level) {
            return Ok(());
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        let mut entry = LogEntry::new(level, Rank(0), extractor.message.unwrap_or_default())
            .with_pkg(metadata.target());
        if !extractor.fields.is_empty() {
            entry = entry.with_data(extractor.fields);
        }
        self.manager.emit(entry)?;
        Ok(())
    }
}

#[derive(Default)]
struct FieldExtractor {
    message: Option<String>,
    fields: EntryData,
}

impl FieldExtractor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldExtractor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

impl<S> Layer<S> for RelayLayer
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target().starts_with(OWN_TARGET) {
            return;
        }
        if let Err(e) = self.forward(event) {
            eprintln!("Failed to forward tracing event: {}", e);
        }
    }
}
