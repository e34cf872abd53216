//! RelayLog 日志条目定义
//!
//! 此模块定义流入传输层的工作单元 `LogEntry`，以及把条目渲染为单行文本的
//! `Layout`。

use crate::core::levels::{LevelStyle, Rank};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 外部格式化器
///
/// 管道不关心其内部结构，只要求它能被渲染为字符串。
pub trait Formatter: Send + Sync + fmt::Debug {
    /// 渲染为字符串，`styled` 表示是否允许带终端样式
    fn render(&self, styled: bool) -> String;
}

/// 消息负载
#[derive(Debug, Clone)]
pub enum Payload {
    /// 纯文本
    Text(String),
    /// 不透明的格式化器
    Formatted(Arc<dyn Formatter>),
}

impl Payload {
    pub fn render(&self, styled: bool) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Formatted(formatter) => formatter.render(styled),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Arc<dyn Formatter>> for Payload {
    fn from(formatter: Arc<dyn Formatter>) -> Self {
        Payload::Formatted(formatter)
    }
}

impl Serialize for Payload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render(false))
    }
}

/// 结构化数据
pub type EntryData = serde_json::Map<String, serde_json::Value>;

/// 日志条目
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// 规范化级别名称
    pub level: String,
    /// 构建时解析出的 rank
    pub rank: Rank,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
    /// 会话 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// 请求 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    /// 包路径
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkg: Option<String>,
    /// 消息负载
    pub message: Payload,
    /// 结构化数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EntryData>,
    /// 绕过阈值检查的强制条目
    #[serde(skip)]
    pub forced: bool,
}

impl LogEntry {
    /// 创建新的日志条目，时间戳取当前时间
    pub fn new<S: Into<String>>(level: S, rank: Rank, message: impl Into<Payload>) -> Self {
        Self {
            level: level.into(),
            rank,
            timestamp: Utc::now(),
            sid: None,
            req_id: None,
            pkg: None,
            message: message.into(),
            data: None,
            forced: false,
        }
    }

    pub fn with_sid<S: Into<String>>(mut self, sid: S) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_req_id<S: Into<String>>(mut self, req_id: S) -> Self {
        self.req_id = Some(req_id.into());
        self
    }

    pub fn with_pkg<S: Into<String>>(mut self, pkg: S) -> Self {
        self.pkg = Some(pkg.into());
        self
    }

    pub fn with_data(mut self, data: EntryData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    /// 获取条目的 JSON 表示
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 时间戳显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    #[default]
    Off,
    /// 相对管理器启动的耗时
    Elapsed,
    Local,
    Utc,
}

impl<'de> Deserialize<'de> for TimestampMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(TimestampMode::Local),
            Raw::Flag(false) => Ok(TimestampMode::Off),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl std::str::FromStr for TimestampMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elapsed" => Ok(TimestampMode::Elapsed),
            "local" | "true" => Ok(TimestampMode::Local),
            "utc" => Ok(TimestampMode::Utc),
            "off" | "false" | "none" => Ok(TimestampMode::Off),
            _ => Err(format!("Invalid timestamp mode: {}", s)),
        }
    }
}

/// 输出字段开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowOptions {
    pub level: bool,
    pub timestamp: TimestampMode,
    pub data: bool,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            level: true,
            timestamp: TimestampMode::Off,
            data: false,
        }
    }
}

/// 条目渲染布局
///
/// 由 `LogManager` 在初始化和修改显示选项时设置给传输管理器。
#[derive(Debug, Clone)]
pub struct Layout {
    pub show: ShowOptions,
    /// 级别列宽
    pub level_width: usize,
    /// 级别名称 -> 样式
    pub styles: HashMap<String, LevelStyle>,
    /// `Elapsed` 模式的起点
    pub started_at: DateTime<Utc>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            show: ShowOptions::default(),
            level_width: 0,
            styles: HashMap::new(),
            started_at: Utc::now(),
        }
    }
}

impl Layout {
    /// 渲染为单行文本（不含换行）
    pub fn render(&self, entry: &LogEntry, styled: bool) -> String {
        let mut output = String::with_capacity(128);

        match self.show.timestamp {
            TimestampMode::Off => {}
            TimestampMode::Elapsed => {
                let elapsed = entry.timestamp - self.started_at;
                let millis = elapsed.num_milliseconds().max(0);
                output.push_str(&format!("[+{}.{:03}s] ", millis / 1000, millis % 1000));
            }
            TimestampMode::Local => {
                let local: DateTime<Local> = entry.timestamp.with_timezone(&Local);
                output.push_str(&format!("[{}] ", local.format("%Y-%m-%d %H:%M:%S%.3f")));
            }
            TimestampMode::Utc => {
                output.push_str(&format!(
                    "[{}] ",
                    entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ")
                ));
            }
        }

        if self.show.level {
            let padded = format!("{:<width$}", entry.level, width = self.level_width);
            if styled {
                output.push_str(&self.style_level(&entry.level, &padded));
            } else {
                output.push_str(&padded);
            }
            output.push(' ');
        }

        if let Some(ref pkg) = entry.pkg {
            output.push('[');
            output.push_str(pkg);
            output.push_str("] ");
        }

        match (&entry.sid, &entry.req_id) {
            (Some(sid), Some(req)) => output.push_str(&format!("({}/{}) ", sid, req)),
            (Some(sid), None) => output.push_str(&format!("({}) ", sid)),
            (None, Some(req)) => output.push_str(&format!("(-/{}) ", req)),
            (None, None) => {}
        }

        output.push_str(&entry.message.render(styled));

        if self.show.data {
            if let Some(ref data) = entry.data {
                if !data.is_empty() {
                    let fields = data
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    output.push_str(" {");
                    output.push_str(&fields);
                    output.push('}');
                }
            }
        }

        output
    }

    fn style_level(&self, name: &str, padded: &str) -> String {
        let styled = match self.styles.get(name) {
            Some(LevelStyle::Red) => padded.red(),
            Some(LevelStyle::BoldRed) => padded.red().bold(),
            Some(LevelStyle::Yellow) => padded.yellow(),
            Some(LevelStyle::Green) => padded.green(),
            Some(LevelStyle::Cyan) => padded.cyan(),
            Some(LevelStyle::Blue) => padded.blue(),
            Some(LevelStyle::Magenta) => padded.magenta(),
            Some(LevelStyle::White) => padded.white(),
            None => return padded.to_string(),
        };
        styled.to_string()
    }
}
