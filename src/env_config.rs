//! 环境变量配置模块
//!
//! 此模块提供从环境变量覆盖 `RelayLogConfig` 显示选项与阈值的功能。

use crate::config::RelayLogConfig;
use crate::core::entry::TimestampMode;
use crate::error::{RelayLogError, Result};
use std::env;

pub const THRESHOLD_VAR: &str = "RELAY_LOG_THRESHOLD";
pub const SHOW_TIMESTAMP_VAR: &str = "RELAY_LOG_SHOW_TIMESTAMP";
pub const SHOW_DATA_VAR: &str = "RELAY_LOG_SHOW_DATA";
pub const SHOW_LEVEL_VAR: &str = "RELAY_LOG_SHOW_LEVEL";

/// 环境变量配置管理器
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量读取全局阈值
    pub fn threshold() -> Option<String> {
        env::var(THRESHOLD_VAR).ok().filter(|s| !s.trim().is_empty())
    }

    /// 从环境变量读取时间戳显示方式
    pub fn show_timestamp() -> Result<Option<TimestampMode>> {
        match read_non_empty(SHOW_TIMESTAMP_VAR) {
            Some(value) => value
                .parse::<TimestampMode>()
                .map(Some)
                .map_err(|e| RelayLogError::config(format!("{}: {}", SHOW_TIMESTAMP_VAR, e))),
            None => Ok(None),
        }
    }

    pub fn show_data() -> Result<Option<bool>> {
        read_bool(SHOW_DATA_VAR)
    }

    pub fn show_level() -> Result<Option<bool>> {
        read_bool(SHOW_LEVEL_VAR)
    }

    /// 把已设置的环境变量应用到配置上，未设置的字段保持不变
    pub fn apply(config: &mut RelayLogConfig) -> Result<()> {
        if let Some(threshold) = Self::threshold() {
            config.threshold = threshold;
        }
        if let Some(mode) = Self::show_timestamp()? {
            config.show_timestamp = mode;
        }
        if let Some(show) = Self::show_data()? {
            config.show_data = show;
        }
        if let Some(show) = Self::show_level()? {
            config.show_level = show;
        }
        Ok(())
    }
}

fn read_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn read_bool(name: &str) -> Result<Option<bool>> {
    match read_non_empty(name) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(RelayLogError::config(format!(
                "{}: expected a boolean, got '{}'",
                name, other
            ))),
        },
        None => Ok(None),
    }
}

/// 加载默认配置并应用环境变量覆盖
pub fn config_from_env() -> Result<RelayLogConfig> {
    let mut config = RelayLogConfig::default();
    EnvConfig::apply(&mut config)?;
    Ok(config)
}
