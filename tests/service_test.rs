//! Tests for the notification service wiring

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use service_notifier::monitor::{HealthProbe, ResourceStatus, StatusSnapshot, StatusSource};
use service_notifier::realtime::{EventSource, MessageStream};
use service_notifier::{
    build_store, Collaborators, ConnectivityStatus, NetworkSignal, NotificationService,
    NotificationStore, RealtimeState, ServiceConfig,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

struct AlwaysHealthy {
    calls: AtomicUsize,
}

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

struct OneModel {
    calls: AtomicUsize,
}

#[async_trait]
impl StatusSource for OneModel {
    async fn fetch(&self) -> Result<StatusSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = StatusSnapshot::new();
        snapshot.insert(
            "haiku".to_string(),
            ResourceStatus {
                name: "Haiku".to_string(),
                available: true,
                load: 10.0,
            },
        );
        Ok(snapshot)
    }
}

/// 发送一条消息后保持连接
struct OneMessage {
    connects: AtomicUsize,
}

#[async_trait]
impl EventSource for OneMessage {
    async fn connect(&self) -> Result<MessageStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let first = stream::iter(vec![Ok(
            r#"{"type":"model_switched","modelName":"Sonnet"}"#.to_string(),
        )]);
        Ok(first.chain(stream::pending()).boxed())
    }
}

struct Mocks {
    health: Arc<AlwaysHealthy>,
    status: Arc<OneModel>,
    events: Arc<OneMessage>,
}

impl Mocks {
    fn new() -> Self {
        Self {
            health: Arc::new(AlwaysHealthy { calls: AtomicUsize::new(0) }),
            status: Arc::new(OneModel { calls: AtomicUsize::new(0) }),
            events: Arc::new(OneMessage { connects: AtomicUsize::new(0) }),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            health: self.health.clone(),
            status: self.status.clone(),
            events: self.events.clone(),
        }
    }
}

/// 记录出现过的每条通知标题（通知过期后仍可断言）
fn record_titles(store: &NotificationStore) -> Arc<Mutex<Vec<String>>> {
    let titles = Arc::new(Mutex::new(Vec::new()));
    let seen = Mutex::new(HashSet::new());
    let sink = titles.clone();
    let _ = store.subscribe(move |list| {
        let mut seen = seen.lock().unwrap();
        for n in list.iter().rev() {
            if seen.insert(n.id.clone()) {
                sink.lock().unwrap().push(n.title.clone());
            }
        }
    });
    titles
}

#[tokio::test(start_paused = true)]
async fn test_all_components_feed_one_store() {
    // Given: a service with every component enabled
    let config = ServiceConfig::default();
    let mocks = Mocks::new();
    let store = build_store(&config);
    let titles = record_titles(&store);

    // When: the service starts and the initial work settles
    let service = NotificationService::start_with(&config, store, mocks.collaborators());
    sleep(Duration::from_millis(10)).await;

    // Then: each component produced its notice in the shared store
    let titles = titles.lock().unwrap().clone();
    assert!(titles.contains(&"Connection Restored".to_string()));
    assert!(titles.contains(&"Model Available".to_string()));
    assert!(titles.contains(&"Model Switched".to_string()));
    assert_eq!(titles.len(), 3);

    assert_eq!(service.connectivity_status(), Some(ConnectivityStatus::Online));
    assert_eq!(service.realtime_state(), Some(RealtimeState::Open));
    assert_eq!(service.store().len(), 3);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling_and_reconnects() {
    let config = ServiceConfig::default();
    let mocks = Mocks::new();
    let store = build_store(&config);

    let service = NotificationService::start_with(&config, store.clone(), mocks.collaborators());
    sleep(Duration::from_millis(10)).await;
    service.shutdown().await;

    let health_calls = mocks.health.calls.load(Ordering::SeqCst);
    let status_calls = mocks.status.calls.load(Ordering::SeqCst);
    let connects = mocks.events.connects.load(Ordering::SeqCst);

    // 关闭后经过多个周期，不应再有任何请求
    sleep(Duration::from_secs(600)).await;

    assert_eq!(mocks.health.calls.load(Ordering::SeqCst), health_calls);
    assert_eq!(mocks.status.calls.load(Ordering::SeqCst), status_calls);
    assert_eq!(mocks.events.connects.load(Ordering::SeqCst), connects);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_components_are_not_started() {
    let config = ServiceConfig {
        enable_connectivity: false,
        enable_realtime: false,
        ..ServiceConfig::default()
    };
    let mocks = Mocks::new();
    let store = build_store(&config);

    let service = NotificationService::start_with(&config, store, mocks.collaborators());
    sleep(Duration::from_millis(10)).await;

    assert!(service.network_signals().is_none());
    assert!(service.connectivity_status().is_none());
    assert!(service.realtime_state().is_none());
    assert_eq!(mocks.health.calls.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.events.connects.load(Ordering::SeqCst), 0);
    assert_eq!(mocks.status.calls.load(Ordering::SeqCst), 1);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_offline_signal_posts_persistent_warning() {
    let config = ServiceConfig {
        enable_resources: false,
        enable_realtime: false,
        ..ServiceConfig::default()
    };
    let mocks = Mocks::new();
    let store = build_store(&config);

    let service = NotificationService::start_with(&config, store.clone(), mocks.collaborators());
    sleep(Duration::from_millis(10)).await;

    let signals = service.network_signals().unwrap();
    signals.send(NetworkSignal::Offline).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    let lost = store
        .list()
        .into_iter()
        .find(|n| n.title == "Network Lost")
        .expect("network lost notice");
    assert!(lost.persistent);
    assert_eq!(service.connectivity_status(), Some(ConnectivityStatus::Offline));

    // 常驻通知不会过期
    sleep(Duration::from_secs(120)).await;
    assert!(store.get(&lost.id).is_some());

    service.shutdown().await;
}
