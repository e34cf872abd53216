//! 网络 Transport
//!
//! 通过 TCP 把日志发送给远端收集器。每条日志编码为一行 JSON 信封
//! （条目字段 + 主机名 + 进程号），按条数或时间间隔批量写出。
//! 连接在 `setup` 中建立，连接成功才视为就绪。

use crate::config::NetworkConfig;
use crate::core::entry::LogEntry;
use crate::core::levels::Rank;
use crate::transports::traits::{Transport, TransportError, TransportResult};
use crate::transports::worker::{Command, Worker};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};

const NEWLINE_BYTES: &[u8] = b"\n";

/// 发送给收集器的信封
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    entry: &'a LogEntry,
    hostname: &'a str,
    pid: u32,
}

/// 网络 Transport
#[derive(Debug)]
pub struct NetworkTransport {
    config: NetworkConfig,
    hostname: String,
    pid: u32,
    worker: Worker<String>,
}

impl NetworkTransport {
    /// 创建新的网络 Transport
    pub fn new(config: NetworkConfig) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            config,
            hostname,
            pid: std::process::id(),
            worker: Worker::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// 把条目编码为一行 JSON
    fn encode(&self, entry: &LogEntry) -> TransportResult<String> {
        let envelope = Envelope {
            entry,
            hostname: &self.hostname,
            pid: self.pid,
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

/// 建立 TCP 连接
async fn connect(address: &str, timeout_ms: u64) -> TransportResult<BufWriter<TcpStream>> {
    let stream = timeout(Duration::from_millis(timeout_ms), TcpStream::connect(address))
        .await
        .map_err(|_| TransportError::Network(format!("Connection timeout: {}", address)))?
        .map_err(|e| TransportError::Network(format!("TCP connection to {} failed: {}", address, e)))?;
    Ok(BufWriter::new(stream))
}

/// 网络后台处理器
struct NetworkProcessor {
    address: String,
    timeout_ms: u64,
    batch_size: usize,
    connection: Option<BufWriter<TcpStream>>,
    batch: Vec<String>,
}

impl NetworkProcessor {
    async fn run(
        mut self,
        mut receiver: mpsc::UnboundedReceiver<Command<String>>,
        flush_interval: Duration,
    ) {
        let mut ticker = interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = receiver.recv() => match command {
                    Some(Command::Write(line)) => {
                        self.batch.push(line);
                        if self.batch.len() >= self.batch_size {
                            if let Err(e) = self.send_batch().await {
                                tracing::error!("Error sending batch to {}: {}", self.address, e);
                            }
                        }
                    }
                    Some(Command::Flush(response)) => {
                        let _ = response.send(self.send_batch().await);
                    }
                    Some(Command::Shutdown(response)) => {
                        let _ = response.send(self.shutdown().await);
                        break;
                    }
                    None => {
                        let _ = self.shutdown().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if let Err(e) = self.send_batch().await {
                        tracing::error!("Error sending batch to {}: {}", self.address, e);
                    }
                }
            }
        }
    }

    /// 写出当前批次；连接断开时重连一次，失败的批次被丢弃
    async fn send_batch(&mut self) -> TransportResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);

        if self.connection.is_none() {
            tracing::info!("Reconnecting to {}", self.address);
        }
        let timeout_ms = self.timeout_ms;
        let result = match self.writer().await {
            Ok(writer) => write_batch(writer, &batch, timeout_ms).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            tracing::warn!(
                "Dropping {} entries for {}: {}",
                batch.len(),
                self.address,
                e
            );
            self.connection = None;
        }
        result
    }

    async fn writer(&mut self) -> TransportResult<&mut BufWriter<TcpStream>> {
        if self.connection.is_none() {
            self.connection = Some(connect(&self.address, self.timeout_ms).await?);
        }
        self.connection.as_mut().ok_or(TransportError::NotReady)
    }

    async fn shutdown(&mut self) -> TransportResult<()> {
        let result = self.send_batch().await;
        if let Some(mut writer) = self.connection.take() {
            let _ = writer.shutdown().await;
        }
        result
    }
}

async fn write_batch(
    writer: &mut BufWriter<TcpStream>,
    batch: &[String],
    timeout_ms: u64,
) -> TransportResult<()> {
    let write = async {
        for line in batch {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(NEWLINE_BYTES).await?;
        }
        writer.flush().await
    };

    timeout(Duration::from_millis(timeout_ms), write)
        .await
        .map_err(|_| TransportError::Network("Write timeout".to_string()))?
        .map_err(|e| TransportError::Network(format!("TCP write failed: {}", e)))
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn setup(&self) -> TransportResult<()> {
        if self.worker.is_running() {
            return Ok(());
        }

        let address = self.address();
        let connection = connect(&address, self.config.timeout_ms).await?;
        tracing::info!("TCP connection established to {}", address);

        let processor = NetworkProcessor {
            address,
            timeout_ms: self.config.timeout_ms,
            batch_size: self.config.batch_size.max(1),
            connection: Some(connection),
            batch: Vec::new(),
        };
        let flush_interval = Duration::from_millis(self.config.flush_interval_ms.max(1));
        self.worker
            .spawn(move |receiver| processor.run(receiver, flush_interval))
            .await;
        Ok(())
    }

    fn output(&self, entry: &LogEntry, _rendered: &str, _rank: Rank) -> TransportResult<()> {
        let line = self.encode(entry)?;
        self.worker.send(line)
    }

    async fn flush(&self) -> TransportResult<()> {
        self.worker.flush().await
    }

    async fn close(&self) -> TransportResult<()> {
        self.worker.shutdown().await
    }

    fn name(&self) -> String {
        format!("network({})", self.address())
    }
}
