//! 通知服务 - 组合 store 与各个摄入组件，统一启动和关闭

use crate::api::{ApiClient, ApiConfig};
use crate::config::ServiceConfig;
use crate::monitor::connectivity::{
    ConnectivityHandle, ConnectivityMonitor, ConnectivityStatus, HealthProbe, NetworkSignal,
};
use crate::monitor::resource::{ResourceHandle, ResourceStatusMonitor, ResourceTracker, StatusSource};
use crate::notification::{DesktopNotifier, NotificationStore, Subscription};
use crate::realtime::{EventSource, RealtimeEventClient, RealtimeHandle, RealtimeState, SseEventSource};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// 外部协作方（可替换为测试实现）
#[derive(Clone)]
pub struct Collaborators {
    pub health: Arc<dyn HealthProbe>,
    pub status: Arc<dyn StatusSource>,
    pub events: Arc<dyn EventSource>,
}

impl Collaborators {
    /// 基于 HTTP 的默认实现
    pub fn http(config: &ServiceConfig) -> Result<Self> {
        let api = Arc::new(ApiClient::new(ApiConfig {
            base_url: config.base_url.clone(),
            timeout_secs: config.request_timeout_secs,
        })?);
        let events = Arc::new(SseEventSource::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?);

        Ok(Self {
            health: api.clone(),
            status: api,
            events,
        })
    }
}

/// 根据配置创建 store
pub fn build_store(config: &ServiceConfig) -> NotificationStore {
    NotificationStore::with_limits(config.capacity, config.default_duration())
}

/// 运行中的通知服务
pub struct NotificationService {
    store: NotificationStore,
    connectivity: Option<ConnectivityHandle>,
    resources: Option<ResourceHandle>,
    realtime: Option<RealtimeHandle>,
    desktop: Option<Subscription>,
}

impl NotificationService {
    /// 使用 HTTP 协作方启动
    pub fn start(config: &ServiceConfig, store: NotificationStore) -> Result<Self> {
        let collaborators = Collaborators::http(config)?;
        Ok(Self::start_with(config, store, collaborators))
    }

    /// 使用指定协作方启动已启用的组件
    pub fn start_with(
        config: &ServiceConfig,
        store: NotificationStore,
        collaborators: Collaborators,
    ) -> Self {
        let desktop = config
            .desktop_notifications
            .then(|| DesktopNotifier::new().attach(&store));

        let connectivity = config.enable_connectivity.then(|| {
            ConnectivityMonitor::new(collaborators.health.clone(), store.clone())
                .with_interval(config.health_interval())
                .start()
        });

        let resources = config.enable_resources.then(|| {
            let tracker = ResourceTracker::new()
                .with_load_thresholds(config.load_delta_threshold, config.high_load_threshold)
                .with_report_missing(config.report_missing_resources);
            ResourceStatusMonitor::new(collaborators.status.clone(), store.clone())
                .with_interval(config.status_interval())
                .with_tracker(tracker)
                .start()
        });

        let realtime = config.enable_realtime.then(|| {
            RealtimeEventClient::new(collaborators.events.clone(), store.clone())
                .with_reconnect_delay(config.reconnect_delay())
                .start()
        });

        info!(
            connectivity = connectivity.is_some(),
            resources = resources.is_some(),
            realtime = realtime.is_some(),
            "Notification service started"
        );

        Self {
            store,
            connectivity,
            resources,
            realtime,
            desktop,
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// 系统网络信号入口，连接监控未启用时返回 None
    pub fn network_signals(&self) -> Option<mpsc::Sender<NetworkSignal>> {
        self.connectivity.as_ref().map(|c| c.signal_sender())
    }

    pub fn connectivity_status(&self) -> Option<ConnectivityStatus> {
        self.connectivity.as_ref().map(|c| c.status())
    }

    pub fn realtime_state(&self) -> Option<RealtimeState> {
        self.realtime.as_ref().map(|r| r.state())
    }

    /// 关闭全部组件：取消定时器、断开连接、注销监听
    pub async fn shutdown(self) {
        if let Some(sub) = &self.desktop {
            sub.unsubscribe();
        }
        if let Some(handle) = self.connectivity {
            handle.shutdown().await;
        }
        if let Some(handle) = self.resources {
            handle.shutdown().await;
        }
        if let Some(handle) = self.realtime {
            handle.shutdown().await;
        }
        info!("Notification service stopped");
    }
}
