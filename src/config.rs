//! 定义 RelayLog 日志管道的所有配置结构体。
//!
//! 配置对象由外部（CLI、配置文件、环境变量）解析后交给 `LogManager::apply_config`，
//! 以及 `init_with_config` 用于构建内置传输。

use crate::core::entry::TimestampMode;
use crate::core::levels::{LevelProfile, LevelRegistry};
use crate::core::queue::DEFAULT_QUEUE_CAPACITY;
use crate::error::{RelayLogError, Result};
use serde::Deserialize;
use std::path::PathBuf;

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_threshold() -> String {
    "INFO".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_file_buffer_size() -> usize {
    8192
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_network_batch_size() -> usize {
    100
}
fn default_network_flush_interval_ms() -> u64 {
    1000
}
fn default_network_timeout_ms() -> u64 {
    5000
}

/// RelayLog 的顶层配置结构体。
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelayLogConfig {
    /// 全局阈值（级别名称）
    #[serde(default = "default_threshold")]
    pub threshold: String,
    #[serde(default = "default_true")]
    pub show_level: bool,
    /// "elapsed" | "local" | "utc" | true | false
    #[serde(default)]
    pub show_timestamp: TimestampMode,
    #[serde(default = "default_false")]
    pub show_data: bool,
    #[serde(default)]
    pub profile: LevelProfile,
    /// 待发送队列容量，满时淘汰最旧的条目
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    pub console: Option<ConsoleConfig>,
    pub file: Option<FileConfig>,
    pub network: Option<NetworkConfig>,
}

impl Default for RelayLogConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            show_level: default_true(),
            show_timestamp: TimestampMode::default(),
            show_data: default_false(),
            profile: LevelProfile::default(),
            queue_capacity: default_queue_capacity(),
            console: None,
            file: None,
            network: None,
        }
    }
}

/// 控制台输出目标
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// 控制台传输配置
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 传输级阈值覆盖
    pub threshold: Option<String>,
    #[serde(default)]
    pub target: ConsoleTarget,
    #[serde(default = "default_true")]
    pub styled: bool,
    /// 至少与该级别一样严重的条目改写到 stderr
    pub stderr_threshold: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            threshold: None,
            target: ConsoleTarget::default(),
            styled: default_true(),
            stderr_threshold: None,
        }
    }
}

/// 文件传输配置
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub threshold: Option<String>,
    /// 日志文件路径，以追加模式打开
    pub path: PathBuf,
    /// 写缓冲大小（字节）
    #[serde(default = "default_file_buffer_size")]
    pub buffer_size: usize,
}

impl FileConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            enabled: default_true(),
            threshold: None,
            path: path.into(),
            buffer_size: default_file_buffer_size(),
        }
    }
}

/// 网络传输配置
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub threshold: Option<String>,
    pub host: String,
    pub port: u16,
    /// 累计多少条后立即发送
    #[serde(default = "default_network_batch_size")]
    pub batch_size: usize,
    /// 批次最长等待时间
    #[serde(default = "default_network_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 连接与写超时
    #[serde(default = "default_network_timeout_ms")]
    pub timeout_ms: u64,
}

impl NetworkConfig {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            enabled: default_true(),
            threshold: None,
            host: host.into(),
            port,
            batch_size: default_network_batch_size(),
            flush_interval_ms: default_network_flush_interval_ms(),
            timeout_ms: default_network_timeout_ms(),
        }
    }
}

/// 用于从 TOML 文件加载 `RelayLogConfig` 的辅助函数。
pub fn load_config_from_file(path: &std::path::Path) -> Result<RelayLogConfig> {
    if !path.exists() {
        return Err(RelayLogError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = std::fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 用于从 TOML 字符串加载 `RelayLogConfig` 的辅助函数。
pub fn load_config_from_str(config_str: &str) -> Result<RelayLogConfig> {
    let config: RelayLogConfig = toml::from_str(config_str)?;
    Ok(config)
}

/// 验证配置的有效性。
///
/// 级别名称按配置档对应的注册表校验，未知名称返回 `UnknownLevel`。
pub fn validate_config(config: &RelayLogConfig) -> Result<()> {
    let registry = LevelRegistry::from_profile(config.profile)?;
    registry.as_rank(config.threshold.as_str())?;
    if config.queue_capacity == 0 {
        return Err(RelayLogError::config("queue capacity must be greater than 0"));
    }

    if let Some(ref console) = config.console {
        validate_optional_level(&registry, console.threshold.as_deref())?;
        validate_optional_level(&registry, console.stderr_threshold.as_deref())?;
    }

    if let Some(ref file) = config.file {
        validate_optional_level(&registry, file.threshold.as_deref())?;

        if file.path.as_os_str().is_empty() {
            return Err(RelayLogError::config("file path must not be empty"));
        }
        if file.buffer_size == 0 {
            return Err(RelayLogError::config("file buffer size must be greater than 0"));
        }
    }

    if let Some(ref network) = config.network {
        validate_optional_level(&registry, network.threshold.as_deref())?;

        if network.host.trim().is_empty() {
            return Err(RelayLogError::config("network host must not be empty"));
        }
        if network.port == 0 {
            return Err(RelayLogError::config("network port must be greater than 0"));
        }
        if network.batch_size == 0 {
            return Err(RelayLogError::config(
                "network batch size must be greater than 0",
            ));
        }
        if network.flush_interval_ms == 0 {
            return Err(RelayLogError::config(
                "network flush interval must be greater than 0",
            ));
        }
    }

    Ok(())
}

fn validate_optional_level(registry: &LevelRegistry, level: Option<&str>) -> Result<()> {
    if let Some(level) = level {
        registry.as_rank(level)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = RelayLogConfig::default();
        assert_eq!(config.threshold, "INFO");
        assert!(config.show_level);
        assert_eq!(config.show_timestamp, TimestampMode::Off);
        assert!(!config.show_data);
        assert_eq!(config.profile, LevelProfile::Standard);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_full_config() {
        let toml = r#"
            threshold = "debug"
            show_timestamp = "elapsed"
            show_data = true
            profile = "Simple"
            queue_capacity = 500

            [console]
            target = "Stderr"
            styled = false

            [file]
            path = "/var/log/app.log"
            threshold = "WARN"

            [network]
            host = "collector.local"
            port = 5140
            batch_size = 10
        "#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.threshold, "debug");
        assert_eq!(config.show_timestamp, TimestampMode::Elapsed);
        assert!(config.show_data);
        assert_eq!(config.profile, LevelProfile::Simple);
        assert_eq!(config.queue_capacity, 500);

        let console = config.console.as_ref().unwrap();
        assert!(console.enabled);
        assert_eq!(console.target, ConsoleTarget::Stderr);
        assert!(!console.styled);

        let file = config.file.as_ref().unwrap();
        assert_eq!(file.threshold.as_deref(), Some("WARN"));
        assert_eq!(file.buffer_size, 8192);

        let network = config.network.as_ref().unwrap();
        assert_eq!(network.batch_size, 10);
        assert_eq!(network.flush_interval_ms, 1000);

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_boolean_timestamp() {
        let config = load_config_from_str("show_timestamp = true").unwrap();
        assert_eq!(config.show_timestamp, TimestampMode::Local);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = load_config_from_str("global_level = \"INFO\"");
        assert!(matches!(result, Err(RelayLogError::TomlError { .. })));
    }

    #[test]
    fn test_validate_unknown_threshold() {
        let config = RelayLogConfig {
            threshold: "TRACE".to_string(),
            profile: LevelProfile::Simple,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(RelayLogError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_validate_sections() {
        let mut config = RelayLogConfig {
            network: Some(NetworkConfig::new("", 5140)),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(RelayLogError::ConfigurationError(_))
        ));

        config.network = Some(NetworkConfig::new("localhost", 0));
        assert!(validate_config(&config).is_err());

        config.network = None;
        config.queue_capacity = 0;
        assert!(validate_config(&config).is_err());

        config.queue_capacity = 16;
        config.file = Some(FileConfig {
            buffer_size: 0,
            ..FileConfig::new("/tmp/app.log")
        });
        assert!(validate_config(&config).is_err());

        config.file = Some(FileConfig {
            threshold: Some("LOUD".to_string()),
            ..FileConfig::new("/tmp/app.log")
        });
        assert!(matches!(
            validate_config(&config),
            Err(RelayLogError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "threshold = \"WARN\"").unwrap();
        writeln!(file, "show_level = false").unwrap();

        let config = load_config_from_file(file.path()).unwrap();
        assert_eq!(config.threshold, "WARN");
        assert!(!config.show_level);
    }

    #[test]
    fn test_missing_config_file() {
        let result = load_config_from_file(std::path::Path::new("/nonexistent/relay_log.toml"));
        assert!(matches!(result, Err(RelayLogError::ConfigFileMissing(_))));
    }
}
