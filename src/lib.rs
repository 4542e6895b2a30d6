//! Service Notifier - 通知存储与连接韧性核心
//!
//! 多个独立的摄入组件（健康检查、资源状态轮询、实时事件流）把事件归一化后
//! 写入同一个有界、按时过期的内存通知存储。

pub mod api;
pub mod config;
pub mod monitor;
pub mod notification;
pub mod prompt_state;
pub mod realtime;
pub mod service;

pub use api::{ApiClient, ApiConfig};
pub use config::ServiceConfig;
pub use monitor::{ConnectivityMonitor, ConnectivityStatus, NetworkSignal, ResourceStatusMonitor};
pub use notification::{
    presets, Notification, NotificationAction, NotificationDraft, NotificationFilter,
    NotificationKind, NotificationStore, Subscription,
};
pub use prompt_state::PromptState;
pub use realtime::{RealtimeEventClient, RealtimeState};
pub use service::{build_store, Collaborators, NotificationService};
