//! 控制台输出 Transport 实现
//!
//! 提供将日志输出到标准输出或标准错误的功能，支持带样式输出，
//! 以及把严重级别的条目改写到标准错误。

use crate::config::{ConsoleConfig, ConsoleTarget};
use crate::core::entry::LogEntry;
use crate::core::levels::Rank;
use crate::transports::traits::{Transport, TransportResult};
use crate::transports::worker::{Command, Worker};

use async_trait::async_trait;
use std::io::{self, Write};
use tokio::sync::mpsc;

/// 一行待输出的文本及其目标流
#[derive(Debug)]
struct ConsoleLine {
    text: String,
    to_stderr: bool,
}

/// 控制台输出 Transport
#[derive(Debug)]
pub struct ConsoleTransport {
    target: ConsoleTarget,
    styled: bool,
    stderr_rank: Option<Rank>,
    worker: Worker<ConsoleLine>,
}

impl ConsoleTransport {
    /// 创建新的控制台 Transport
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            target,
            styled: true,
            stderr_rank: None,
            worker: Worker::new(),
        }
    }

    /// 从配置创建；`stderr_rank` 由调用方按注册表解析
    pub fn from_config(config: &ConsoleConfig, stderr_rank: Option<Rank>) -> Self {
        Self::new(config.target)
            .with_style(config.styled)
            .with_stderr_at(stderr_rank)
    }

    pub fn stdout() -> Self {
        Self::new(ConsoleTarget::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(ConsoleTarget::Stderr)
    }

    pub fn with_style(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    /// 至少与 `rank` 一样严重的条目写到 stderr
    pub fn with_stderr_at(mut self, rank: Option<Rank>) -> Self {
        self.stderr_rank = rank;
        self
    }

    /// 检查后台任务是否正在运行
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn routes_to_stderr(&self, rank: Rank) -> bool {
        match self.target {
            ConsoleTarget::Stderr => true,
            ConsoleTarget::Stdout => self
                .stderr_rank
                .map(|limit| rank.is_at_least_as_severe_as(limit))
                .unwrap_or(false),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::stdout()
    }
}

/// 控制台后台处理循环
async fn run_console(mut receiver: mpsc::UnboundedReceiver<Command<ConsoleLine>>) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Write(line) => {
                if let Err(e) = write_line(&line) {
                    tracing::error!("Error writing to console: {}", e);
                }
            }
            Command::Flush(response) => {
                let _ = response.send(flush_streams());
            }
            Command::Shutdown(response) => {
                let _ = response.send(flush_streams());
                break;
            }
        }
    }
}

fn write_line(line: &ConsoleLine) -> io::Result<()> {
    if line.to_stderr {
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.text.as_bytes())?;
        stderr.write_all(b"\n")
    } else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.text.as_bytes())?;
        stdout.write_all(b"\n")
    }
}

fn flush_streams() -> TransportResult<()> {
    io::stdout().flush()?;
    io::stderr().flush()?;
    Ok(())
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn setup(&self) -> TransportResult<()> {
        if self.worker.is_running() {
            return Ok(());
        }
        self.worker.spawn(run_console).await;
        tracing::debug!("ConsoleTransport started ({:?})", self.target);
        Ok(())
    }

    fn output(&self, _entry: &LogEntry, rendered: &str, rank: Rank) -> TransportResult<()> {
        self.worker.send(ConsoleLine {
            text: rendered.to_string(),
            to_stderr: self.routes_to_stderr(rank),
        })
    }

    async fn flush(&self) -> TransportResult<()> {
        self.worker.flush().await
    }

    async fn close(&self) -> TransportResult<()> {
        self.worker.shutdown().await?;
        tracing::debug!("ConsoleTransport shutdown completed");
        Ok(())
    }

    fn wants_style(&self) -> bool {
        self.styled
    }

    fn name(&self) -> String {
        match self.target {
            ConsoleTarget::Stdout => "console(stdout)".to_string(),
            ConsoleTarget::Stderr => "console(stderr)".to_string(),
        }
    }
}
