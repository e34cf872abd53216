//! 日志级别注册表
//!
//! 此模块定义某个日志配置档（profile）下的有序级别集合：名称与数值 rank
//! 的双向映射、触发立即刷新的级别、默认级别与最低级别。
//!
//! 约定：rank 数值越小越严重。多个名称可以共享同一个 rank（别名，例如
//! `FATAL`/`CRITICAL`），此时反向查找 `as_name` 总是返回最先声明的名称。

use crate::error::{RelayLogError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 级别的数值排序位置，数值越小越严重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub i32);

impl Rank {
    /// 是否至少与 `other` 一样严重
    pub fn is_at_least_as_severe_as(self, other: Rank) -> bool {
        self.0 <= other.0
    }

    /// 两者中更严重（更严格）的一个
    pub fn most_severe(self, other: Rank) -> Rank {
        if self.is_at_least_as_severe_as(other) {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 级别的渲染提示，仅用于带样式的输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelStyle {
    Red,
    BoldRed,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
    White,
}

/// 单个级别定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDefinition {
    /// 规范化（大写）名称
    pub name: String,
    /// 数值 rank
    pub rank: Rank,
    /// 渲染提示
    pub style: Option<LevelStyle>,
    /// 命中时立即刷新待发送队列
    pub flush_trigger: bool,
    /// 警告级别标记
    pub warn_marker: bool,
    /// 默认级别
    pub is_default: bool,
    /// 最低（最不严重）级别
    pub is_lowest: bool,
}

impl LevelDefinition {
    /// 创建新的级别定义，名称会被规范化为大写
    pub fn new<S: AsRef<str>>(name: S, rank: i32) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            rank: Rank(rank),
            style: None,
            flush_trigger: false,
            warn_marker: false,
            is_default: false,
            is_lowest: false,
        }
    }

    pub fn with_style(mut self, style: LevelStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn flush_trigger(mut self) -> Self {
        self.flush_trigger = true;
        self
    }

    pub fn warn_marker(mut self) -> Self {
        self.warn_marker = true;
        self
    }

    pub fn default_level(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn lowest(mut self) -> Self {
        self.is_lowest = true;
        self
    }
}

/// 名称规范化：去除首尾空白并转为大写
pub fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// 按名称或 rank 选择级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSelector<'a> {
    Name(&'a str),
    Rank(Rank),
}

impl<'a> From<&'a str> for LevelSelector<'a> {
    fn from(name: &'a str) -> Self {
        LevelSelector::Name(name)
    }
}

impl<'a> From<&'a String> for LevelSelector<'a> {
    fn from(name: &'a String) -> Self {
        LevelSelector::Name(name.as_str())
    }
}

impl From<Rank> for LevelSelector<'_> {
    fn from(rank: Rank) -> Self {
        LevelSelector::Rank(rank)
    }
}

impl From<StandardLevel> for LevelSelector<'static> {
    fn from(level: StandardLevel) -> Self {
        LevelSelector::Name(level.name())
    }
}

impl fmt::Display for LevelSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelSelector::Name(name) => write!(f, "{}", name),
            LevelSelector::Rank(rank) => write!(f, "rank {}", rank),
        }
    }
}

/// 内置配置档使用的封闭级别集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardLevel {
    Fatal,
    Critical,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl StandardLevel {
    pub const ALL: [StandardLevel; 7] = [
        StandardLevel::Fatal,
        StandardLevel::Critical,
        StandardLevel::Error,
        StandardLevel::Warn,
        StandardLevel::Info,
        StandardLevel::Debug,
        StandardLevel::Trace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StandardLevel::Fatal => "FATAL",
            StandardLevel::Critical => "CRITICAL",
            StandardLevel::Error => "ERROR",
            StandardLevel::Warn => "WARN",
            StandardLevel::Info => "INFO",
            StandardLevel::Debug => "DEBUG",
            StandardLevel::Trace => "TRACE",
        }
    }

    /// 将 `tracing` 的级别映射为内置级别
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => StandardLevel::Error,
            tracing::Level::WARN => StandardLevel::Warn,
            tracing::Level::INFO => StandardLevel::Info,
            tracing::Level::DEBUG => StandardLevel::Debug,
            tracing::Level::TRACE => StandardLevel::Trace,
        }
    }
}

/// 内置级别配置档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LevelProfile {
    /// FATAL/CRITICAL/ERROR/WARN/INFO/DEBUG/TRACE
    #[default]
    Standard,
    /// ERROR/WARN/INFO/DEBUG
    Simple,
}

static STANDARD_LEVELS: Lazy<Vec<LevelDefinition>> = Lazy::new(|| {
    vec![
        LevelDefinition::new("FATAL", 0)
            .with_style(LevelStyle::BoldRed)
            .flush_trigger(),
        LevelDefinition::new("CRITICAL", 0)
            .with_style(LevelStyle::BoldRed)
            .flush_trigger(),
        LevelDefinition::new("ERROR", 1).with_style(LevelStyle::Red),
        LevelDefinition::new("WARN", 2)
            .with_style(LevelStyle::Yellow)
            .warn_marker(),
        LevelDefinition::new("INFO", 3)
            .with_style(LevelStyle::Green)
            .default_level(),
        LevelDefinition::new("DEBUG", 4).with_style(LevelStyle::Cyan),
        LevelDefinition::new("TRACE", 5)
            .with_style(LevelStyle::White)
            .lowest(),
    ]
});

static SIMPLE_LEVELS: Lazy<Vec<LevelDefinition>> = Lazy::new(|| {
    vec![
        LevelDefinition::new("ERROR", 0)
            .with_style(LevelStyle::Red)
            .flush_trigger(),
        LevelDefinition::new("WARN", 1)
            .with_style(LevelStyle::Yellow)
            .warn_marker(),
        LevelDefinition::new("INFO", 2)
            .with_style(LevelStyle::Green)
            .default_level(),
        LevelDefinition::new("DEBUG", 3)
            .with_style(LevelStyle::Cyan)
            .lowest(),
    ]
});

impl LevelProfile {
    /// 配置档对应的级别定义（声明顺序）
    pub fn definitions(self) -> Vec<LevelDefinition> {
        match self {
            LevelProfile::Standard => STANDARD_LEVELS.clone(),
            LevelProfile::Simple => SIMPLE_LEVELS.clone(),
        }
    }
}

/// 级别注册表
///
/// 构建后不可变。一个 `LogManager` 在其生命周期内只持有一个注册表，
/// 重新初始化会整体替换它。
#[derive(Debug, Clone)]
pub struct LevelRegistry {
    /// 声明顺序的级别定义
    definitions: Vec<LevelDefinition>,
    /// 名称 -> 定义下标
    by_name: HashMap<String, usize>,
    /// rank -> 最先声明的定义下标
    by_rank: BTreeMap<Rank, usize>,
    default_index: usize,
    lowest_index: usize,
    warn_index: Option<usize>,
}

impl LevelRegistry {
    /// 从级别定义集合构建注册表
    ///
    /// 空集合、重复名称、缺少默认级别或存在多个默认级别都会返回
    /// `ConfigurationError`。
    pub fn new(definitions: Vec<LevelDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(RelayLogError::config(
                "level registry requires at least one level",
            ));
        }

        let mut by_name = HashMap::with_capacity(definitions.len());
        let mut by_rank = BTreeMap::new();
        let mut default_index = None;
        let mut lowest_index = None;
        let mut warn_index = None;

        for (index, definition) in definitions.iter().enumerate() {
            if definition.name.is_empty() {
                return Err(RelayLogError::config("level name must not be empty"));
            }
            if by_name.insert(definition.name.clone(), index).is_some() {
                return Err(RelayLogError::config(format!(
                    "duplicate level name: {}",
                    definition.name
                )));
            }
            // 别名共享 rank 时保留最先声明的定义
            by_rank.entry(definition.rank).or_insert(index);

            if definition.is_default {
                if default_index.is_some() {
                    return Err(RelayLogError::config(format!(
                        "more than one default level (second: {})",
                        definition.name
                    )));
                }
                default_index = Some(index);
            }
            if definition.is_lowest && lowest_index.is_none() {
                lowest_index = Some(index);
            }
            if definition.warn_marker && warn_index.is_none() {
                warn_index = Some(index);
            }
        }

        let default_index = default_index
            .ok_or_else(|| RelayLogError::config("no level is flagged as default"))?;

        let lowest_index = match lowest_index {
            Some(index) => index,
            None => by_rank
                .iter()
                .next_back()
                .map(|(_, index)| *index)
                .ok_or_else(|| RelayLogError::internal("rank index is empty"))?,
        };

        Ok(Self {
            definitions,
            by_name,
            by_rank,
            default_index,
            lowest_index,
            warn_index,
        })
    }

    /// 从内置配置档构建
    pub fn from_profile(profile: LevelProfile) -> Result<Self> {
        Self::new(profile.definitions())
    }

    /// 声明顺序的全部定义
    pub fn definitions(&self) -> &[LevelDefinition] {
        &self.definitions
    }

    /// 解析级别定义；rank 选择器解析到最先声明的别名
    pub fn definition<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<&LevelDefinition> {
        let level = level.into();
        let index = match level {
            LevelSelector::Name(name) => self.by_name.get(&canonical_name(name)).copied(),
            LevelSelector::Rank(rank) => self.by_rank.get(&rank).copied(),
        };
        index
            .map(|index| &self.definitions[index])
            .ok_or_else(|| RelayLogError::unknown_level(level.to_string()))
    }

    pub fn contains<'a>(&self, level: impl Into<LevelSelector<'a>>) -> bool {
        self.definition(level).is_ok()
    }

    /// 名称解析为 rank；传入 rank 时校验其存在后原样返回
    pub fn as_rank<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<Rank> {
        self.definition(level).map(|definition| definition.rank)
    }

    /// rank 反查名称，别名取最先声明者
    pub fn as_name(&self, rank: Rank) -> Result<&str> {
        self.definition(rank).map(|definition| definition.name.as_str())
    }

    /// `level` 是否至少与 `threshold` 一样严重
    pub fn meets_threshold<'a, 'b>(
        &self,
        level: impl Into<LevelSelector<'a>>,
        threshold: impl Into<LevelSelector<'b>>,
    ) -> Result<bool> {
        let level = self.as_rank(level)?;
        let threshold = self.as_rank(threshold)?;
        Ok(level.is_at_least_as_severe_as(threshold))
    }

    /// 级别是否触发立即刷新
    pub fn meets_flush_threshold<'a>(&self, level: impl Into<LevelSelector<'a>>) -> Result<bool> {
        self.definition(level).map(|definition| definition.flush_trigger)
    }

    pub fn default_level_name(&self) -> &str {
        &self.definitions[self.default_index].name
    }

    pub fn default_rank(&self) -> Rank {
        self.definitions[self.default_index].rank
    }

    pub fn lowest_level_name(&self) -> &str {
        &self.definitions[self.lowest_index].name
    }

    pub fn warn_level_name(&self) -> Option<&str> {
        self.warn_index
            .map(|index| self.definitions[index].name.as_str())
    }

    /// 至少与 `up_to` 一样严重的级别中最长名称的长度，用于列对齐
    pub fn max_width<'a>(&self, up_to: impl Into<LevelSelector<'a>>) -> Result<usize> {
        let limit = self.as_rank(up_to)?;
        Ok(self
            .definitions
            .iter()
            .filter(|definition| definition.rank.is_at_least_as_severe_as(limit))
            .map(|definition| definition.name.chars().count())
            .max()
            .unwrap_or(0))
    }

    /// 名称 -> 样式
    pub fn style_of(&self, name: &str) -> Option<LevelStyle> {
        self.by_name
            .get(&canonical_name(name))
            .and_then(|index| self.definitions[*index].style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_registry() -> LevelRegistry {
        LevelRegistry::new(vec![
            LevelDefinition::new("error", 0).flush_trigger(),
            LevelDefinition::new("warn", 1).warn_marker(),
            LevelDefinition::new("info", 2).default_level(),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let result = LevelRegistry::new(Vec::new());
        assert!(matches!(result, Err(RelayLogError::ConfigurationError(_))));
    }

    #[test]
    fn test_missing_default_is_configuration_error() {
        let result = LevelRegistry::new(vec![
            LevelDefinition::new("error", 0),
            LevelDefinition::new("info", 1),
        ]);
        assert!(matches!(result, Err(RelayLogError::ConfigurationError(_))));
    }

    #[test]
    fn test_multiple_defaults_rejected() {
        let result = LevelRegistry::new(vec![
            LevelDefinition::new("error", 0).default_level(),
            LevelDefinition::new("info", 1).default_level(),
        ]);
        assert!(matches!(result, Err(RelayLogError::ConfigurationError(_))));
    }

    #[test]
    fn test_duplicate_names_rejected_case_insensitively() {
        let result = LevelRegistry::new(vec![
            LevelDefinition::new("info", 1).default_level(),
            LevelDefinition::new("INFO", 2),
        ]);
        assert!(matches!(result, Err(RelayLogError::ConfigurationError(_))));
    }

    #[test]
    fn test_name_rank_round_trip() {
        let registry = LevelRegistry::from_profile(LevelProfile::Simple).unwrap();
        for definition in registry.definitions() {
            let rank = registry.as_rank(&definition.name).unwrap();
            assert_eq!(registry.as_name(rank).unwrap(), definition.name);
        }
        // 大小写不敏感
        assert_eq!(registry.as_rank("warn").unwrap(), Rank(1));
        assert_eq!(registry.as_rank(" Info ").unwrap(), Rank(2));
    }

    #[test]
    fn test_rank_selector_is_validated_identity() {
        let registry = scenario_registry();
        assert_eq!(registry.as_rank(Rank(1)).unwrap(), Rank(1));
        assert!(matches!(
            registry.as_rank(Rank(7)),
            Err(RelayLogError::UnknownLevel(_))
        ));
        assert!(matches!(
            registry.as_rank("verbose"),
            Err(RelayLogError::UnknownLevel(_))
        ));
        assert!(matches!(
            registry.as_name(Rank(9)),
            Err(RelayLogError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_alias_prefers_first_declared() {
        let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        assert_eq!(registry.as_rank("critical").unwrap(), Rank(0));
        assert_eq!(registry.as_rank("fatal").unwrap(), Rank(0));
        for _ in 0..10 {
            assert_eq!(registry.as_name(Rank(0)).unwrap(), "FATAL");
        }

        // 声明顺序反转后，首选名称随之改变
        let reversed = LevelRegistry::new(vec![
            LevelDefinition::new("critical", 0),
            LevelDefinition::new("fatal", 0),
            LevelDefinition::new("info", 1).default_level(),
        ])
        .unwrap();
        assert_eq!(reversed.as_name(Rank(0)).unwrap(), "CRITICAL");
    }

    #[test]
    fn test_meets_threshold_reflexive_and_monotonic() {
        let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        let names: Vec<String> = registry
            .definitions()
            .iter()
            .map(|d| d.name.clone())
            .collect();

        for level in &names {
            assert!(registry.meets_threshold(level, level).unwrap());
        }

        for level in &names {
            for strict in &names {
                for permissive in &names {
                    let strict_rank = registry.as_rank(strict).unwrap();
                    let permissive_rank = registry.as_rank(permissive).unwrap();
                    if registry.meets_threshold(level, strict).unwrap()
                        && strict_rank.is_at_least_as_severe_as(permissive_rank)
                    {
                        assert!(registry.meets_threshold(level, permissive).unwrap());
                    }
                }
            }
        }

        assert!(registry.meets_threshold("error", "info").unwrap());
        assert!(!registry.meets_threshold("debug", "info").unwrap());
    }

    #[test]
    fn test_flush_threshold() {
        let registry = scenario_registry();
        assert!(registry.meets_flush_threshold("error").unwrap());
        assert!(!registry.meets_flush_threshold("warn").unwrap());
        assert!(registry.meets_flush_threshold(Rank(0)).unwrap());
        assert!(registry.meets_flush_threshold("nope").is_err());
    }

    #[test]
    fn test_derived_level_names() {
        let registry = scenario_registry();
        assert_eq!(registry.default_level_name(), "INFO");
        assert_eq!(registry.default_rank(), Rank(2));
        assert_eq!(registry.warn_level_name(), Some("WARN"));
        // 未标记最低级别时取 rank 最大者
        assert_eq!(registry.lowest_level_name(), "INFO");

        let standard = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        assert_eq!(standard.lowest_level_name(), "TRACE");

        let no_warn = LevelRegistry::new(vec![LevelDefinition::new("only", 0).default_level()])
            .unwrap();
        assert_eq!(no_warn.warn_level_name(), None);
    }

    #[test]
    fn test_max_width() {
        let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        assert_eq!(registry.max_width("fatal").unwrap(), "CRITICAL".len());
        assert_eq!(registry.max_width("trace").unwrap(), "CRITICAL".len());

        let simple = LevelRegistry::from_profile(LevelProfile::Simple).unwrap();
        assert_eq!(simple.max_width("warn").unwrap(), 5);
        assert_eq!(simple.max_width("error").unwrap(), 5);
        assert_eq!(simple.max_width("debug").unwrap(), 5);
        assert!(simple.max_width("trace").is_err());
    }

    #[test]
    fn test_style_lookup_ignores_case() {
        let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        assert_eq!(registry.style_of("warn"), Some(LevelStyle::Yellow));
        assert_eq!(registry.style_of("WARN"), Some(LevelStyle::Yellow));
        assert_eq!(registry.style_of("verbose"), None);
    }

    #[test]
    fn test_standard_level_mapping() {
        let registry = LevelRegistry::from_profile(LevelProfile::Standard).unwrap();
        for level in StandardLevel::ALL {
            assert!(registry.contains(level));
        }
        assert_eq!(
            StandardLevel::from_tracing(&tracing::Level::WARN),
            StandardLevel::Warn
        );
    }
}
