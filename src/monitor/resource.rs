//! 资源状态监控 - 轮询模型后端状态并与上一次快照比对
//!
//! ## 比对规则
//! 1. 首次出现 -> "now available"（info）
//! 2. available false -> true -> "restored"（success）
//! 3. available true -> false -> "unavailable"（warning）
//! 4. 负载从高负载线以下进入高负载，且相对上一次采样上升 > 阈值
//!    或相对基线上升 >= 阈值 -> "high load"（warning）
//! 5. 从响应中消失 -> 可选的 "removed"（warning），并从快照删除
//!
//! 负载基线只在出现显著变化时移动，小幅波动不会累积成告警风暴。

use crate::notification::{presets, NotificationDraft, NotificationStore};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 默认轮询间隔
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(60);
/// 默认显著负载变化
pub const DEFAULT_LOAD_DELTA: f64 = 20.0;
/// 默认高负载线
pub const DEFAULT_HIGH_LOAD: f64 = 80.0;

/// 单个资源状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub name: String,
    pub available: bool,
    /// 负载百分比 0..100
    #[serde(default)]
    pub load: f64,
}

/// resource id -> 状态
pub type StatusSnapshot = BTreeMap<String, ResourceStatus>;

/// 状态来源
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self) -> Result<StatusSnapshot>;
}

/// 比对产生的变化
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceChange {
    Discovered { id: String, name: String },
    Restored { id: String, name: String },
    Unavailable { id: String, name: String },
    HighLoad { id: String, name: String, load: f64 },
    Missing { id: String, name: String },
}

impl ResourceChange {
    pub fn id(&self) -> &str {
        match self {
            ResourceChange::Discovered { id, .. }
            | ResourceChange::Restored { id, .. }
            | ResourceChange::Unavailable { id, .. }
            | ResourceChange::HighLoad { id, .. }
            | ResourceChange::Missing { id, .. } => id,
        }
    }

    /// 转换为通知
    pub fn to_draft(&self) -> NotificationDraft {
        match self {
            ResourceChange::Discovered { name, .. } => presets::resource_discovered(name),
            ResourceChange::Restored { name, .. } => presets::resource_restored(name),
            ResourceChange::Unavailable { name, .. } => presets::resource_unavailable(name),
            ResourceChange::HighLoad { name, load, .. } => presets::resource_high_load(name, *load),
            ResourceChange::Missing { name, .. } => presets::resource_missing(name),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedResource {
    status: ResourceStatus,
    load_baseline: f64,
}

impl TrackedResource {
    /// 从高负载线以下进入高负载，且相对上一次采样或基线显著上升
    fn crosses_into_high_load(&self, load: f64, delta: f64, high: f64) -> bool {
        let previous = self.status.load;
        if load <= high || previous > high {
            return false;
        }
        load - previous > delta || load - self.load_baseline >= delta
    }
}

/// 快照比对器（纯逻辑，不含 I/O）
#[derive(Debug)]
pub struct ResourceTracker {
    previous: HashMap<String, TrackedResource>,
    load_delta: f64,
    high_load: f64,
    report_missing: bool,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self {
            previous: HashMap::new(),
            load_delta: DEFAULT_LOAD_DELTA,
            high_load: DEFAULT_HIGH_LOAD,
            report_missing: true,
        }
    }

    /// 设置负载阈值
    pub fn with_load_thresholds(mut self, delta: f64, high: f64) -> Self {
        self.load_delta = delta;
        self.high_load = high;
        self
    }

    /// 消失的资源是否上报；为 false 时保留最后已知状态
    pub fn with_report_missing(mut self, report: bool) -> Self {
        self.report_missing = report;
        self
    }

    /// 上一次记录的状态
    pub fn last_status(&self, id: &str) -> Option<&ResourceStatus> {
        self.previous.get(id).map(|t| &t.status)
    }

    pub fn tracked_count(&self) -> usize {
        self.previous.len()
    }

    /// 比对新快照，更新内部状态并返回变化
    pub fn apply(&mut self, snapshot: StatusSnapshot) -> Vec<ResourceChange> {
        let mut changes = Vec::new();

        if self.report_missing {
            let mut missing: Vec<String> = self
                .previous
                .keys()
                .filter(|id| !snapshot.contains_key(*id))
                .cloned()
                .collect();
            missing.sort();
            for id in missing {
                if let Some(tracked) = self.previous.remove(&id) {
                    changes.push(ResourceChange::Missing { id, name: tracked.status.name });
                }
            }
        }

        for (id, status) in snapshot {
            let change = match self.previous.get_mut(&id) {
                None => {
                    let change = ResourceChange::Discovered { id: id.clone(), name: status.name.clone() };
                    self.previous.insert(
                        id,
                        TrackedResource { load_baseline: status.load, status },
                    );
                    Some(change)
                }
                Some(tracked) => {
                    let change = if status.available != tracked.status.available {
                        tracked.load_baseline = status.load;
                        if status.available {
                            Some(ResourceChange::Restored { id: id.clone(), name: status.name.clone() })
                        } else {
                            Some(ResourceChange::Unavailable { id: id.clone(), name: status.name.clone() })
                        }
                    } else {
                        let high_load =
                            tracked.crosses_into_high_load(status.load, self.load_delta, self.high_load);
                        if high_load || (status.load - tracked.load_baseline).abs() >= self.load_delta {
                            tracked.load_baseline = status.load;
                        }
                        high_load.then(|| ResourceChange::HighLoad {
                            id: id.clone(),
                            name: status.name.clone(),
                            load: status.load,
                        })
                    };
                    tracked.status = status;
                    change
                }
            };

            if let Some(change) = change {
                changes.push(change);
            }
        }

        changes
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// 资源状态监控
pub struct ResourceStatusMonitor {
    source: Arc<dyn StatusSource>,
    store: NotificationStore,
    tracker: ResourceTracker,
    interval: Duration,
}

impl ResourceStatusMonitor {
    pub fn new(source: Arc<dyn StatusSource>, store: NotificationStore) -> Self {
        Self {
            source,
            store,
            tracker: ResourceTracker::new(),
            interval: DEFAULT_STATUS_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_tracker(mut self, tracker: ResourceTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// 启动后台任务：立即轮询一次，之后按间隔轮询
    pub fn start(self) -> ResourceHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        ResourceHandle { cancel, task }
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Resource status monitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let result = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.source.fetch() => result,
                    };
                    self.handle_poll(result);
                }
            }
        }

        debug!("Resource status monitor stopped");
    }

    fn handle_poll(&mut self, result: Result<StatusSnapshot>) {
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to check resource status");
                return;
            }
        };

        for change in self.tracker.apply(snapshot) {
            debug!(resource = %change.id(), ?change, "Resource status changed");
            self.store.add(change.to_draft());
        }
    }
}

/// 资源监控句柄
pub struct ResourceHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ResourceHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Resource status monitor task failed");
        }
    }
}
