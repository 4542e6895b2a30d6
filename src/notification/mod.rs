//! 通知核心 - 内存通知存储、预设文案和桌面转发
//!
//! # 设计目标
//! 1. 单一数据源：所有摄入组件只调用 `NotificationStore` 的公开方法
//! 2. 有界集合：超出容量淘汰最早条目，非常驻条目按时过期
//! 3. 文案集中：`presets` 负责把领域事件映射为通知内容
//!
//! # 使用示例
//! ```ignore
//! use service_notifier::notification::{presets, NotificationStore};
//!
//! let store = NotificationStore::new();
//! let id = store.add(presets::deployment_complete("shop"));
//! store.remove(&id);
//! ```

pub mod model;
pub mod store;
pub mod presets;
pub mod desktop;

pub use model::{
    ActionEffect, Notification, NotificationAction, NotificationDraft, NotificationFilter,
    NotificationKind,
};
pub use store::{NotificationStore, Subscription, DEFAULT_CAPACITY, DEFAULT_DURATION};
pub use desktop::DesktopNotifier;
