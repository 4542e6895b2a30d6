//! Tests for the notification store public API

use service_notifier::notification::{
    presets, NotificationDraft, NotificationFilter, NotificationKind, NotificationStore,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_six_adds_into_capacity_five() {
    // Given: a store with capacity 5
    let store = NotificationStore::with_limits(5, Duration::from_secs(60));

    // When: adding 6 notifications
    let first = store.add(NotificationDraft::info("first", "1"));
    for i in 2..=6 {
        store.add(NotificationDraft::info(format!("n{}", i), i.to_string()));
    }

    // Then: 5 remain and the first-added one is gone
    assert_eq!(store.len(), 5);
    assert!(store.get(&first).is_none());
    assert_eq!(store.list()[0].title, "n6");
}

#[tokio::test]
async fn test_capacity_never_exceeded_with_mixed_kinds() {
    let store = NotificationStore::with_limits(3, Duration::from_secs(60));
    let mut ids = Vec::new();

    for i in 0..20 {
        let draft = if i % 2 == 0 {
            presets::connection_lost()
        } else {
            presets::model_switched("Haiku")
        };
        ids.push(store.add(draft));
        assert!(store.len() <= 3);
    }

    // 只保留最后三个
    let kept: Vec<String> = store.list().into_iter().map(|n| n.id).collect();
    let expected: Vec<String> = ids.iter().rev().take(3).cloned().collect();
    assert_eq!(kept, expected);
    // 常驻条目没有定时器，只有非常驻条目计数
    assert_eq!(store.pending_expiries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_removed_before_expiry_does_not_fire_late() {
    // Given: a short-lived notification that is dismissed early
    let store = NotificationStore::new();
    let events = Arc::new(Mutex::new(0usize));
    let counter = events.clone();
    let _sub = store.subscribe(move |_| {
        *counter.lock().unwrap() += 1;
    });

    let id = store.add(NotificationDraft::success("Saved", "ok").with_duration_ms(500));
    store.remove(&id);
    assert_eq!(store.pending_expiries(), 0);

    // When: the scheduled deadline passes
    sleep(Duration::from_secs(1)).await;

    // Then: only add + remove were observed
    assert_eq!(*events.lock().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_evicted_entry_timer_is_cancelled() {
    let store = NotificationStore::with_limits(1, Duration::from_millis(100));
    let old = store.add(NotificationDraft::info("old", "x"));
    let new = store.add(NotificationDraft::info("new", "y").persistent());

    assert!(store.get(&old).is_none());
    assert_eq!(store.pending_expiries(), 0);

    sleep(Duration::from_millis(200)).await;
    assert!(store.get(&new).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_update_does_not_reset_timer() {
    let store = NotificationStore::new();
    let id = store.add(NotificationDraft::warning("w", "m").with_duration_ms(1000));

    sleep(Duration::from_millis(600)).await;
    assert!(store.mark_read(&id));

    sleep(Duration::from_millis(500)).await;
    assert!(store.get(&id).is_none());
}

#[tokio::test]
async fn test_filters_and_counts() {
    let store = NotificationStore::with_limits(10, Duration::from_secs(60));
    let info = store.add(NotificationDraft::info("i", "m"));
    store.add(NotificationDraft::warning("w", "m"));
    store.add(presets::maintenance_mode("tonight"));

    store.mark_read(&info);

    assert_eq!(store.count(NotificationFilter::All), 3);
    assert_eq!(store.count(NotificationFilter::Unread), 2);
    assert_eq!(store.count(NotificationFilter::Important), 2);

    let important: Vec<NotificationKind> = store
        .list_filtered(NotificationFilter::Important)
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(important, vec![NotificationKind::System, NotificationKind::Warning]);
}
