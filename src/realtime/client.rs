//! 实时事件客户端 - 长连接 + 固定延迟重连
//!
//! 任何传输错误都不会立即重试，而是在固定延迟后安排一次重连，无限循环直到被关闭。
//! 关闭时同时断开当前连接并取消待执行的重连。

use super::envelope::RealtimeEvent;
use crate::notification::NotificationStore;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认重连延迟
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// 原始消息流（每项为一条消息的 data）
pub type MessageStream = BoxStream<'static, Result<String>>;

/// 服务端推送事件源
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(&self) -> Result<MessageStream>;
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeState {
    Connecting,
    Open,
    /// 等待重连
    Waiting,
    Closed,
}

enum StreamEnd {
    Cancelled,
    Failed,
}

/// 实时事件客户端
pub struct RealtimeEventClient {
    source: Arc<dyn EventSource>,
    store: NotificationStore,
    reconnect_delay: Duration,
}

impl RealtimeEventClient {
    pub fn new(source: Arc<dyn EventSource>, store: NotificationStore) -> Self {
        Self {
            source,
            store,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// 启动后台任务，立即建立连接
    pub fn start(self) -> RealtimeHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(RealtimeState::Connecting);
        let reconnects = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(self.run(cancel.clone(), state_tx, reconnects.clone()));

        RealtimeHandle {
            cancel,
            state: state_rx,
            reconnects,
            task,
        }
    }

    async fn run(
        self,
        cancel: CancellationToken,
        state: watch::Sender<RealtimeState>,
        reconnects: Arc<AtomicU64>,
    ) {
        loop {
            state.send_replace(RealtimeState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = self.source.connect() => connected,
            };

            match connected {
                Ok(stream) => {
                    // 建连本身不产生通知
                    state.send_replace(RealtimeState::Open);
                    info!("Realtime notifications connected");
                    if let StreamEnd::Cancelled = self.consume(stream, &cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to realtime updates");
                }
            }

            state.send_replace(RealtimeState::Waiting);
            debug!(delay_secs = self.reconnect_delay.as_secs(), "Realtime reconnect scheduled");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.reconnect_delay) => {}
            }
            reconnects.fetch_add(1, Ordering::SeqCst);
        }

        state.send_replace(RealtimeState::Closed);
        debug!("Realtime client stopped");
    }

    /// 读取消息直到连接断开或被取消；返回时 stream 被 drop，连接随之关闭
    async fn consume(&self, mut stream: MessageStream, cancel: &CancellationToken) -> StreamEnd {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(payload)) => self.handle_message(&payload),
                Some(Err(e)) => {
                    warn!(error = %e, "Real-time connection lost, retrying...");
                    return StreamEnd::Failed;
                }
                None => {
                    warn!("Real-time stream closed by server, retrying...");
                    return StreamEnd::Failed;
                }
            }
        }
    }

    /// 解析并分发一条消息，格式错误只记录日志
    fn handle_message(&self, payload: &str) {
        match RealtimeEvent::parse(payload) {
            Ok(event) => {
                debug!(event_type = %event.event_type(), "Realtime event received");
                self.store.add(event.into_draft());
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed realtime message");
                debug!(payload = %payload, "Malformed payload");
            }
        }
    }
}

/// 实时客户端句柄
pub struct RealtimeHandle {
    cancel: CancellationToken,
    state: watch::Receiver<RealtimeState>,
    reconnects: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    pub fn state(&self) -> RealtimeState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RealtimeState> {
        self.state.clone()
    }

    /// 已执行的重连次数
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 关闭连接并取消待执行的重连
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Realtime client task failed");
        }
    }
}
