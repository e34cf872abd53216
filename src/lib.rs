//! RelayLog - 分级日志路由管道
//!
//! RelayLog 把日志器产生的条目按级别阈值过滤，附加会话、请求与包路径上下文，
//! 然后扇出到多个传输（控制台、文件、网络）。传输就绪之前产生的条目进入
//! FIFO 队列，就绪后按原顺序送达。
//!
//! # 快速开始
//!
//! ```no_run
//! use relay_log::{init, StandardLevel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = init().await?;
//!     let logger = manager.logger()?.child("app");
//!
//!     logger.info().message("Application started").emit()?;
//!     logger
//!         .level(StandardLevel::Warn)
//!         .message("Disk almost full")
//!         .field("free_mb", 512)
//!         .emit()?;
//!
//!     manager.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # 自定义配置
//!
//! ```no_run
//! use relay_log::{init_with_config, ConsoleConfig, RelayLogConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayLogConfig {
//!         threshold: "DEBUG".to_string(),
//!         console: Some(ConsoleConfig::default()),
//!         ..Default::default()
//!     };
//!
//!     let manager = init_with_config(config).await?;
//!     manager.logger()?.debug().message("verbose").emit()?;
//!     manager.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod env_config;
pub mod error;
pub mod transports;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, validate_config, ConsoleConfig, ConsoleTarget,
    FileConfig, NetworkConfig, RelayLogConfig,
};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use env_config::{config_from_env, EnvConfig};
pub use error::{RelayLogError, Result, TransportFailure};

// 重新导出核心功能
pub use crate::core::{
    ContextEmitter, EntryContext, EntryData, EntryResult, Formatter, LevelDefinition,
    LevelProfile, LevelRegistry, LevelSelector, LevelStyle, LogEntry, LogManager, Logger,
    ManagerState, MessageBuilder, Payload, Rank, RelayLayer, StandardLevel, TimestampMode,
};
pub use transports::{
    ConsoleTransport, FileTransport, NetworkTransport, NullTransport, Transport, TransportError,
    TransportId, TransportManager,
};

use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 使用环境变量覆盖后的默认配置初始化，默认启用控制台输出
///
/// 返回已启动的 `LogManager`，由调用方负责在退出前 `stop`。
pub async fn init() -> Result<Arc<LogManager>> {
    let mut config = config_from_env()?;
    if config.console.is_none() {
        config.console = Some(ConsoleConfig::default());
    }
    init_with_config(config).await
}

/// 使用指定配置初始化
///
/// 校验配置，构建注册表与显示选项，按配置注册控制台、文件和网络传输
/// （含各自的阈值覆盖），然后启动管理器。
///
/// 个别传输 setup 失败只记录告警，其余传输照常工作。
pub async fn init_with_config(config: RelayLogConfig) -> Result<Arc<LogManager>> {
    validate_config(&config)?;

    let manager = Arc::new(LogManager::default());
    manager.apply_config(&config)?;
    register_configured_transports(&manager, &config)?;
    match manager.start().await {
        Err(e @ (RelayLogError::TransportIo(_) | RelayLogError::TransportFailures(_))) => {
            tracing::warn!(
                "Started with {} transport(s) after setup failures: {}",
                manager.transport_manager().ready_count(),
                e
            );
        }
        other => other?,
    }

    Ok(manager)
}

fn register_configured_transports(manager: &LogManager, config: &RelayLogConfig) -> Result<()> {
    let registry = manager.registry()?;

    if let Some(console) = config.console.as_ref().filter(|console| console.enabled) {
        let stderr_rank = console
            .stderr_threshold
            .as_deref()
            .map(|level| registry.as_rank(level))
            .transpose()?;
        let id = manager.register_transport(Arc::new(ConsoleTransport::from_config(
            console,
            stderr_rank,
        )));
        manager.set_transport_threshold(id, console.threshold.as_deref().map(LevelSelector::from))?;
    }

    if let Some(file) = config.file.as_ref().filter(|file| file.enabled) {
        let id = manager.register_transport(Arc::new(FileTransport::from_config(file)));
        manager.set_transport_threshold(id, file.threshold.as_deref().map(LevelSelector::from))?;
    }

    if let Some(network) = config.network.as_ref().filter(|network| network.enabled) {
        let id = manager.register_transport(Arc::new(NetworkTransport::new(network.clone())));
        manager.set_transport_threshold(
            id,
            network.threshold.as_deref().map(LevelSelector::from),
        )?;
    }

    Ok(())
}

/// 把 `RelayLayer` 安装为全局 tracing 订阅器
///
/// 之后应用中的 `tracing` 事件都会进入该管理器的管道。
pub fn install_global_layer(manager: Arc<LogManager>) -> Result<()> {
    tracing_subscriber::registry()
        .with(RelayLayer::new(manager))
        .try_init()
        .map_err(|e| RelayLogError::internal(format!("Failed to install global subscriber: {}", e)))
}
