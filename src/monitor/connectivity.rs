//! 连接监控 - 健康检查轮询 + 系统在线/离线信号
//!
//! 状态机：`Connecting -> Online <-> Offline`，只在状态变化时发通知，
//! 所以不会连续出现两条 "Connection Restored"。

use crate::notification::{presets, NotificationDraft, NotificationStore};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认健康检查间隔
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

type ProbeFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// 健康检查
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// 服务是否健康（2xx 视为健康）
    async fn check(&self) -> bool;
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Connecting,
    Online,
    Offline,
}

/// 系统网络信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSignal {
    Online,
    Offline,
}

/// 信号处理结果
#[derive(Debug)]
pub struct SignalOutcome {
    /// 立即发出的通知
    pub notice: NotificationDraft,
    /// 是否需要立即重新探测
    pub reprobe: bool,
}

/// 连接状态机（纯逻辑，不含 I/O）
#[derive(Debug)]
pub struct ConnectivityTracker {
    status: ConnectivityStatus,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self { status: ConnectivityStatus::Connecting }
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    /// 处理一次探测结果
    pub fn on_probe(&mut self, healthy: bool) -> Option<NotificationDraft> {
        let previous = self.status;
        if healthy {
            self.status = ConnectivityStatus::Online;
            if previous != ConnectivityStatus::Online {
                info!(from = ?previous, "Connection restored");
                return Some(presets::connection_restored());
            }
        } else {
            self.status = ConnectivityStatus::Offline;
            if previous == ConnectivityStatus::Online {
                warn!("Health check failed, connection lost");
                return Some(presets::connection_lost());
            }
        }
        None
    }

    /// 处理系统网络信号
    ///
    /// 离线信号发出常驻警告并直接置为离线；在线信号发出短提示，
    /// 但不假设服务健康，状态由随后的重新探测决定。
    pub fn on_signal(&mut self, signal: NetworkSignal) -> SignalOutcome {
        match signal {
            NetworkSignal::Offline => {
                self.status = ConnectivityStatus::Offline;
                SignalOutcome {
                    notice: presets::network_lost(),
                    reprobe: false,
                }
            }
            NetworkSignal::Online => SignalOutcome {
                notice: presets::network_restored(),
                reprobe: true,
            },
        }
    }
}

impl Default for ConnectivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// 连接监控
pub struct ConnectivityMonitor {
    probe: Arc<dyn HealthProbe>,
    store: NotificationStore,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, store: NotificationStore) -> Self {
        Self {
            probe,
            store,
            interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    /// 设置轮询间隔
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 启动后台任务：立即探测一次，之后按间隔轮询
    pub fn start(self) -> ConnectivityHandle {
        let cancel = CancellationToken::new();
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel(ConnectivityStatus::Connecting);

        let task = tokio::spawn(self.run(cancel.clone(), signal_rx, status_tx));

        ConnectivityHandle {
            cancel,
            signals: signal_tx,
            status: status_rx,
            task,
        }
    }

    fn spawn_probe(&self) -> ProbeFuture {
        let probe = self.probe.clone();
        Box::pin(async move { probe.check().await })
    }

    async fn run(
        self,
        cancel: CancellationToken,
        mut signals: mpsc::Receiver<NetworkSignal>,
        status_tx: watch::Sender<ConnectivityStatus>,
    ) {
        let mut tracker = ConnectivityTracker::new();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut signals_open = true;
        // 探测作为独立分支，进行中也能立即处理信号
        let mut in_flight: Option<ProbeFuture> = None;

        info!(interval_secs = self.interval.as_secs(), "Connectivity monitor started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                signal = signals.recv(), if signals_open => {
                    match signal {
                        Some(signal) => {
                            debug!(?signal, "Network signal received");
                            let outcome = tracker.on_signal(signal);
                            self.store.add(outcome.notice);
                            if outcome.reprobe {
                                // 旧的探测可能发生在网络恢复之前，直接替换
                                in_flight = Some(self.spawn_probe());
                            }
                        }
                        None => signals_open = false,
                    }
                }
                healthy = poll_probe(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if let Some(draft) = tracker.on_probe(healthy) {
                        self.store.add(draft);
                    }
                }
                // 第一次 tick 立即完成，即挂载时的首次探测
                _ = ticker.tick() => {
                    if in_flight.is_none() {
                        in_flight = Some(self.spawn_probe());
                    } else {
                        debug!("Health probe still running, skipping tick");
                    }
                }
            }
            status_tx.send_replace(tracker.status());
        }

        debug!("Connectivity monitor stopped");
    }
}

async fn poll_probe(probe: &mut Option<ProbeFuture>) -> bool {
    match probe {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

/// 连接监控句柄
pub struct ConnectivityHandle {
    cancel: CancellationToken,
    signals: mpsc::Sender<NetworkSignal>,
    status: watch::Receiver<ConnectivityStatus>,
    task: JoinHandle<()>,
}

impl ConnectivityHandle {
    /// 用于投递系统在线/离线信号
    pub fn signal_sender(&self) -> mpsc::Sender<NetworkSignal> {
        self.signals.clone()
    }

    /// 当前状态
    pub fn status(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    /// 订阅状态变化
    pub fn watch_status(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 停止轮询并注销信号监听
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Connectivity monitor task failed");
        }
    }
}
