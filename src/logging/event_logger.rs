// src/logging/event_logger.rs

use crate::logging::events::AdEvent;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Duration};
use tracing::{error, info};
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event queue is full")]
    QueueFull,
    #[error("event queue is closed")]
    Closed,
    #[error("cannot encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 事件发布，不得阻塞请求
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &AdEvent) -> Result<(), EventError>;
}

pub type ErrorSink = Arc<dyn Fn(EventError) + Send + Sync>;

/// 默认错误出口：写入运行日志
pub fn tracing_error_sink() -> ErrorSink {
    Arc::new(|e: EventError| error!(error = %e, "failed to publish auction event"))
}

/// **事件日志**：逐条发布，失败交给错误出口，从不向调用方返回错误
#[derive(Clone)]
pub struct EventLogger {
    publisher: Arc<dyn EventPublisher>,
    on_error: ErrorSink,
}

impl EventLogger {
    pub fn new(publisher: Arc<dyn EventPublisher>, on_error: ErrorSink) -> Self {
        Self { publisher, on_error }
    }

    pub fn log(&self, events: &[AdEvent]) {
        for event in events {
            if let Err(e) = self.publisher.publish(event) {
                (self.on_error)(e);
            }
        }
    }
}

/// 有界队列 + 后台批量写入按小时滚动的文件
pub struct RollingFilePublisher {
    sender: Sender<String>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl RollingFilePublisher {
    /// - `buffer_size`: 队列容量，满时丢弃并报告 `QueueFull`
    /// - `batch_size`: 批量写入条数
    /// - `flush_interval`: 定时刷盘间隔（毫秒）
    pub fn new(
        log_dir: impl AsRef<Path>,
        file_name: &str,
        buffer_size: usize,
        batch_size: usize,
        flush_interval: u64,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let log_file = Arc::new(rolling::hourly(log_dir, file_name));

        let writer = tokio::spawn(Self::background_writer(
            log_file,
            receiver,
            shutdown_rx,
            batch_size.max(1),
            flush_interval.max(1),
        ));

        Self {
            sender,
            shutdown: Mutex::new(Some(shutdown_tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    async fn background_writer(
        log_file: Arc<RollingFileAppender>,
        mut receiver: Receiver<String>,
        mut shutdown: oneshot::Receiver<()>,
        batch_size: usize,
        flush_interval: u64,
    ) {
        let mut buffer = Vec::with_capacity(batch_size);
        let mut interval = time::interval(Duration::from_millis(flush_interval));

        loop {
            tokio::select! {
                line = receiver.recv() => match line {
                    Some(line) => {
                        buffer.push(line);
                        if buffer.len() >= batch_size {
                            Self::write_to_disk(log_file.clone(), &mut buffer).await;
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        Self::write_to_disk(log_file.clone(), &mut buffer).await;
                    }
                }
                _ = &mut shutdown => {
                    // 停止接收，排空队列中剩余的事件
                    receiver.close();
                    while let Some(line) = receiver.recv().await {
                        buffer.push(line);
                    }
                    break;
                }
            }
        }

        if !buffer.is_empty() {
            Self::write_to_disk(log_file, &mut buffer).await;
        }
    }

    async fn write_to_disk(file: Arc<RollingFileAppender>, buffer: &mut Vec<String>) {
        let content = buffer.join("\n") + "\n";
        buffer.clear();

        let result = task::spawn_blocking(move || {
            let mut writer = file.make_writer();
            writer.write_all(content.as_bytes())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "failed to write auction events"),
            Err(e) => error!(error = %e, "event writer task failed"),
        }
    }

    /// 刷盘并停止后台任务
    pub async fn shutdown(&self) {
        let signal = self.shutdown.lock().ok().and_then(|mut guard| guard.take());
        if let Some(signal) = signal {
            let _ = signal.send(());
        }
        let writer = self.writer.lock().ok().and_then(|mut guard| guard.take());
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                error!(error = %e, "event writer did not stop cleanly");
            }
        }
        info!("auction event log flushed");
    }
}

impl EventPublisher for RollingFilePublisher {
    fn publish(&self, event: &AdEvent) -> Result<(), EventError> {
        let line = serde_json::to_string(event)?;
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => EventError::QueueFull,
            TrySendError::Closed(_) => EventError::Closed,
        })
    }
}

/// 测试用：保存在内存中
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryPublisher {
    pub events: Mutex<Vec<AdEvent>>,
}

#[cfg(test)]
impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: &AdEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
