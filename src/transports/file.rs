//! 单一文件 Transport
//!
//! 以追加模式写入单个日志文件。setup 时创建父目录并打开文件，写入经过
//! `BufWriter` 缓冲，flush/close 时落盘。

use crate::config::FileConfig;
use crate::core::entry::LogEntry;
use crate::core::levels::Rank;
use crate::transports::traits::{Transport, TransportError, TransportResult};
use crate::transports::worker::{Command, Worker};

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// 单一文件 Transport
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    buffer_size: usize,
    worker: Worker<String>,
}

impl FileTransport {
    /// 创建新的文件 Transport
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            buffer_size: 8192,
            worker: Worker::new(),
        }
    }

    pub fn from_config(config: &FileConfig) -> Self {
        Self::new(config.path.clone()).with_buffer_size(config.buffer_size)
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn open(&self) -> TransportResult<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                TransportError::Config(format!(
                    "Failed to open file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        Ok(BufWriter::with_capacity(self.buffer_size, file))
    }
}

/// 文件后台处理循环
async fn run_file(
    mut writer: BufWriter<File>,
    mut receiver: mpsc::UnboundedReceiver<Command<String>>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Write(line) => {
                let result = writer
                    .write_all(line.as_bytes())
                    .and_then(|_| writer.write_all(b"\n"));
                if let Err(e) = result {
                    tracing::error!("Error writing to log file: {}", e);
                }
            }
            Command::Flush(response) => {
                let _ = response.send(writer.flush().map_err(TransportError::from));
            }
            Command::Shutdown(response) => {
                let _ = response.send(writer.flush().map_err(TransportError::from));
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn setup(&self) -> TransportResult<()> {
        if self.worker.is_running() {
            return Ok(());
        }

        let writer = self.open()?;
        self.worker
            .spawn(move |receiver| run_file(writer, receiver))
            .await;
        tracing::debug!("FileTransport started: {}", self.path.display());
        Ok(())
    }

    fn output(&self, _entry: &LogEntry, rendered: &str, _rank: Rank) -> TransportResult<()> {
        self.worker.send(rendered.to_string())
    }

    async fn flush(&self) -> TransportResult<()> {
        self.worker.flush().await
    }

    async fn close(&self) -> TransportResult<()> {
        self.worker.shutdown().await?;
        tracing::debug!("FileTransport closed: {}", self.path.display());
        Ok(())
    }

    fn name(&self) -> String {
        format!("file({})", self.path.display())
    }
}
