//! 通知存储 - 有容量上限、按条目自动过期的内存通知集合
//!
//! # 不变式
//! 1. 集合大小不超过 `capacity`，超出时淘汰最早加入的条目
//! 2. 每个非常驻条目恰好有一个过期定时器，条目被移除时定时器同时取消
//! 3. 列表按加入顺序倒序（最新在前）
//! 4. 监听器按变更顺序收到快照，多线程并发变更时也一样
//!
//! 所有操作均为同步操作，只有定时器触发是异步的。

use super::model::{Notification, NotificationDraft, NotificationFilter, NotificationKind};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// 默认容量
pub const DEFAULT_CAPACITY: usize = 5;
/// 默认过期时长
pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);

type Listener = Arc<dyn Fn(&[Notification]) + Send + Sync>;

struct StoreInner {
    /// 最新在前
    items: VecDeque<Notification>,
    /// id -> 过期定时器
    timers: HashMap<String, AbortHandle>,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    /// 待投递的快照，按变更顺序排队
    outbox: VecDeque<Broadcast>,
    /// 是否已有调用方在投递
    delivering: bool,
    capacity: usize,
    default_duration: Duration,
}

impl StoreInner {
    fn cancel_timer(&mut self, id: &str) {
        if let Some(timer) = self.timers.remove(id) {
            timer.abort();
        }
    }

    /// 把当前快照排入投递队列，返回调用方是否负责投递
    ///
    /// 同一时刻只有一个投递者，快照按变更顺序送达，监听器不会在新列表之后收到旧列表。
    fn broadcast(&mut self) -> bool {
        let broadcast = Broadcast {
            snapshot: self.items.iter().cloned().collect(),
            listeners: self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
        };
        self.outbox.push_back(broadcast);
        !std::mem::replace(&mut self.delivering, true)
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

struct Broadcast {
    snapshot: Vec<Notification>,
    listeners: Vec<Listener>,
}

impl Broadcast {
    fn deliver(self) {
        for listener in &self.listeners {
            listener(&self.snapshot);
        }
    }
}

/// 监听器 panic 时释放投递权，后续变更仍能投递
struct DeliveryGuard<'a> {
    store: &'a NotificationStore,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut inner = self.store.lock();
            inner.delivering = false;
            inner.outbox.clear();
        }
    }
}

/// 通知存储
///
/// 克隆后共享同一集合。所有摄入组件只通过公开方法访问。
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl NotificationStore {
    /// 使用默认容量（5）和默认过期时长（5 秒）创建
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CAPACITY, DEFAULT_DURATION)
    }

    /// 指定容量和默认过期时长创建，容量至少为 1
    pub fn with_limits(capacity: usize, default_duration: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                items: VecDeque::new(),
                timers: HashMap::new(),
                listeners: Vec::new(),
                next_listener_id: 0,
                outbox: VecDeque::new(),
                delivering: false,
                capacity: capacity.max(1),
                default_duration,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 锁外依次投递队列中的快照；监听器内的再次变更会排在队尾
    fn deliver(&self) {
        let _guard = DeliveryGuard { store: self };
        loop {
            let next = {
                let mut inner = self.lock();
                let next = inner.outbox.pop_front();
                // 队列为空与释放投递权在同一把锁内完成，避免快照滞留
                if next.is_none() {
                    inner.delivering = false;
                }
                next
            };
            match next {
                Some(broadcast) => broadcast.deliver(),
                None => return,
            }
        }
    }

    /// 添加通知，返回分配的 id
    ///
    /// 超出容量时淘汰最早的条目（先取消其定时器）；非常驻条目会注册过期定时器。
    pub fn add(&self, draft: NotificationDraft) -> String {
        let id = Self::generate_id();

        let should_deliver = {
            let mut inner = self.lock();
            let duration = if draft.persistent {
                None
            } else {
                Some(draft.duration.unwrap_or(inner.default_duration))
            };

            inner.items.push_front(Notification {
                id: id.clone(),
                kind: draft.kind,
                title: draft.title,
                message: draft.message,
                timestamp: Utc::now(),
                duration,
                persistent: duration.is_none(),
                action: draft.action,
                action_invoked: false,
                data: draft.data,
            });

            while inner.items.len() > inner.capacity {
                if let Some(evicted) = inner.items.pop_back() {
                    inner.cancel_timer(&evicted.id);
                    debug!(id = %evicted.id, "Evicted oldest notification");
                }
            }

            if let Some(duration) = duration {
                self.schedule_expiry(&mut inner, &id, duration);
            }

            inner.broadcast()
        };

        if should_deliver {
            self.deliver();
        }
        id
    }

    fn generate_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("notification-{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
    }

    fn schedule_expiry(&self, inner: &mut StoreInner, id: &str, duration: Duration) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(id = %id, "No async runtime available, notification will not expire");
                return;
            }
        };

        let deadline = tokio::time::Instant::now() + duration;
        let store: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        let expired_id = id.to_string();
        let task = handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = store.upgrade() {
                NotificationStore { inner }.expire(&expired_id);
            }
        });

        inner.timers.insert(id.to_string(), task.abort_handle());
    }

    /// 定时器到期：定时器任务本身正在运行，只移除登记不再 abort
    fn expire(&self, id: &str) {
        let should_deliver = {
            let mut inner = self.lock();
            inner.timers.remove(id);
            let before = inner.items.len();
            inner.items.retain(|n| n.id != id);
            if inner.items.len() == before {
                return;
            }
            debug!(id = %id, "Notification expired");
            inner.broadcast()
        };
        if should_deliver {
            self.deliver();
        }
    }

    /// 移除通知（幂等），同时取消定时器
    pub fn remove(&self, id: &str) {
        let should_deliver = {
            let mut inner = self.lock();
            inner.cancel_timer(id);
            let before = inner.items.len();
            inner.items.retain(|n| n.id != id);
            if inner.items.len() == before {
                return;
            }
            inner.broadcast()
        };
        if should_deliver {
            self.deliver();
        }
    }

    /// 清空全部通知
    pub fn clear_all(&self) {
        let should_deliver = {
            let mut inner = self.lock();
            for (_, timer) in inner.timers.drain() {
                timer.abort();
            }
            if inner.items.is_empty() {
                return;
            }
            inner.items.clear();
            inner.broadcast()
        };
        if should_deliver {
            self.deliver();
        }
    }

    /// 清除指定类型的全部通知
    pub fn clear_by_kind(&self, kind: NotificationKind) {
        let should_deliver = {
            let mut inner = self.lock();
            let ids: Vec<String> = inner
                .items
                .iter()
                .filter(|n| n.kind == kind)
                .map(|n| n.id.clone())
                .collect();
            if ids.is_empty() {
                return;
            }
            for id in &ids {
                inner.cancel_timer(id);
            }
            inner.items.retain(|n| n.kind != kind);
            inner.broadcast()
        };
        if should_deliver {
            self.deliver();
        }
    }

    /// 将 `partial` 合并进条目的 `data` 字段，不重置定时器、不改变顺序
    ///
    /// 返回条目是否存在
    pub fn update(&self, id: &str, partial: Map<String, Value>) -> bool {
        let should_deliver = {
            let mut inner = self.lock();
            let Some(notification) = inner.items.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            notification.data.extend(partial);
            inner.broadcast()
        };
        if should_deliver {
            self.deliver();
        }
        true
    }

    /// 标记为已读
    pub fn mark_read(&self, id: &str) -> bool {
        let mut partial = Map::new();
        partial.insert("read".to_string(), Value::Bool(true));
        self.update(id, partial)
    }

    /// 执行条目的动作，每个条目最多执行一次
    ///
    /// 返回本次是否实际执行了回调
    pub fn invoke_action(&self, id: &str) -> bool {
        let (action, should_deliver) = {
            let mut inner = self.lock();
            let Some(notification) = inner.items.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            if notification.action_invoked {
                return false;
            }
            let Some(action) = notification.action.clone() else {
                return false;
            };
            notification.action_invoked = true;
            (action, inner.broadcast())
        };

        debug!(id = %id, label = %action.label, "Running notification action");
        action.run();
        if should_deliver {
            self.deliver();
        }
        true
    }

    /// 订阅变更，回调收到最新的有序列表
    ///
    /// 回调在锁外执行，可以再调用 store 的方法。
    pub fn subscribe(&self, listener: impl Fn(&[Notification]) + Send + Sync + 'static) -> Subscription {
        let mut inner = self.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// 当前列表快照（最新在前）
    pub fn list(&self) -> Vec<Notification> {
        self.lock().items.iter().cloned().collect()
    }

    /// 按过滤条件获取列表
    pub fn list_filtered(&self, filter: NotificationFilter) -> Vec<Notification> {
        self.lock()
            .items
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect()
    }

    /// 按过滤条件计数
    pub fn count(&self, filter: NotificationFilter) -> usize {
        self.lock().items.iter().filter(|n| filter.matches(n)).count()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.lock().items.iter().find(|n| n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// 尚未触发的过期定时器数量
    pub fn pending_expiries(&self) -> usize {
        self.lock().timers.len()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅句柄
pub struct Subscription {
    store: Weak<Mutex<StoreInner>>,
    id: u64,
}

impl Subscription {
    /// 取消订阅（幂等）
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.store.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
