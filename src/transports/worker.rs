//! 传输后台任务句柄
//!
//! 具体传输的 `output` 是同步且不可阻塞的：调用方把数据通过无界通道交给
//! 后台任务，由任务串行写出。刷新与关闭通过 oneshot 通道等待任务确认。

use crate::transports::traits::{TransportError, TransportResult};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// 后台任务消息类型
#[derive(Debug)]
pub(crate) enum Command<T> {
    /// 待写出的数据
    Write(T),
    /// 刷新请求
    Flush(oneshot::Sender<TransportResult<()>>),
    /// 关闭信号
    Shutdown(oneshot::Sender<TransportResult<()>>),
}

/// 后台任务句柄
#[derive(Debug)]
pub(crate) struct Worker<T> {
    sender: Mutex<Option<mpsc::UnboundedSender<Command<T>>>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Command<T>>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// 启动后台任务；`run` 接收消息接收端并返回任务主体
    pub(crate) async fn spawn<F, Fut>(&self, run: F)
    where
        F: FnOnce(mpsc::UnboundedReceiver<Command<T>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(receiver));

        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
        if let Some(previous) = self.handle.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// 非阻塞提交
    pub(crate) fn send(&self, item: T) -> TransportResult<()> {
        let sender = self.sender().ok_or(TransportError::NotReady)?;
        sender
            .send(Command::Write(item))
            .map_err(|_| TransportError::Closed)
    }

    /// 等待任务处理完此前提交的所有数据；未运行时直接返回
    pub(crate) async fn flush(&self) -> TransportResult<()> {
        let Some(sender) = self.sender() else {
            return Ok(());
        };

        let (response_sender, response_receiver) = oneshot::channel();
        sender
            .send(Command::Flush(response_sender))
            .map_err(|_| TransportError::Closed)?;
        response_receiver
            .await
            .map_err(|_| TransportError::Generic("Failed to receive flush response".to_string()))?
    }

    /// 发送关闭信号并等待任务退出；重复调用是无操作
    pub(crate) async fn shutdown(&self) -> TransportResult<()> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return Ok(());
        };

        let (response_sender, response_receiver) = oneshot::channel();
        let result = match sender.send(Command::Shutdown(response_sender)) {
            Ok(()) => response_receiver.await.map_err(|_| {
                TransportError::Generic("Failed to receive shutdown response".to_string())
            })?,
            Err(_) => Err(TransportError::Closed),
        };

        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        result
    }
}
