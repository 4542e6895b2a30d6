//! 通知数据模型 - 通知实体、草稿和动作

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
            NotificationKind::System => "system",
        }
    }

    /// 解析类型字符串，未知值返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "success" => Some(NotificationKind::Success),
            "error" => Some(NotificationKind::Error),
            "warning" => Some(NotificationKind::Warning),
            "info" => Some(NotificationKind::Info),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }

    /// 是否属于重要类型（error / warning）
    pub fn is_alert(&self) -> bool {
        matches!(self, NotificationKind::Error | NotificationKind::Warning)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 动作回调
pub type ActionEffect = Arc<dyn Fn() + Send + Sync>;

/// 通知附带的动作（标签 + 回调）
#[derive(Clone)]
pub struct NotificationAction {
    /// 按钮标签
    pub label: String,
    effect: ActionEffect,
}

impl NotificationAction {
    pub fn new(label: impl Into<String>, effect: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            effect: Arc::new(effect),
        }
    }

    /// 执行回调
    pub fn run(&self) {
        (self.effect)();
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Serialize for NotificationAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("NotificationAction", 1)?;
        state.serialize_field("label", &self.label)?;
        state.end()
    }
}

/// 待添加的通知（尚未分配 id 和时间戳）
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// 自动过期时长，None 时使用 store 默认值
    pub duration: Option<Duration>,
    /// 常驻通知，不会自动过期
    pub persistent: bool,
    pub action: Option<NotificationAction>,
    pub data: Map<String, Value>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            duration: None,
            persistent: false,
            action: None,
            data: Map::new(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn system(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::System, title, message)
    }

    /// 设置自动过期时长
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// 设置自动过期时长（毫秒）
    pub fn with_duration_ms(self, millis: u64) -> Self {
        self.with_duration(Duration::from_millis(millis))
    }

    /// 标记为常驻通知
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// 设置动作
    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// 设置附加数据
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// 已进入 store 的通知实体
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// 过期时长（毫秒），None 表示常驻
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Option<Duration>,
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<NotificationAction>,
    /// 动作是否已执行
    pub action_invoked: bool,
    pub data: Map<String, Value>,
}

fn serialize_duration_ms<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

impl Notification {
    /// 是否已读（由外部消费者通过 `data.read` 标记）
    pub fn is_read(&self) -> bool {
        self.data.get("read").and_then(Value::as_bool).unwrap_or(false)
    }

    /// 是否重要：error / warning 或常驻通知
    pub fn is_important(&self) -> bool {
        self.kind.is_alert() || self.persistent
    }
}

/// 通知过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationFilter {
    #[default]
    All,
    Unread,
    Important,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        match self {
            NotificationFilter::All => true,
            NotificationFilter::Unread => !notification.is_read(),
            NotificationFilter::Important => notification.is_important(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: NotificationKind, persistent: bool) -> Notification {
        Notification {
            id: "n-1".to_string(),
            kind,
            title: "t".to_string(),
            message: "m".to_string(),
            timestamp: Utc::now(),
            duration: if persistent { None } else { Some(Duration::from_secs(5)) },
            persistent,
            action: None,
            action_invoked: false,
            data: Map::new(),
        }
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(NotificationKind::parse("Warning"), Some(NotificationKind::Warning));
        assert_eq!(NotificationKind::parse("system"), Some(NotificationKind::System));
        assert_eq!(NotificationKind::parse("fatal"), None);
    }

    #[test]
    fn test_filters() {
        let mut info = sample(NotificationKind::Info, false);
        let pinned = sample(NotificationKind::Info, true);
        let error = sample(NotificationKind::Error, false);

        assert!(NotificationFilter::Unread.matches(&info));
        info.data.insert("read".to_string(), Value::Bool(true));
        assert!(!NotificationFilter::Unread.matches(&info));

        assert!(!NotificationFilter::Important.matches(&info));
        assert!(NotificationFilter::Important.matches(&pinned));
        assert!(NotificationFilter::Important.matches(&error));
        assert!(NotificationFilter::All.matches(&info));
    }

    #[test]
    fn test_serialize_omits_action_effect() {
        let mut n = sample(NotificationKind::Success, false);
        n.action = Some(NotificationAction::new("Open App", || {}));
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["kind"], "success");
        assert_eq!(json["duration_ms"], 5000);
        assert_eq!(json["action"]["label"], "Open App");
    }

    #[test]
    fn test_draft_builder() {
        let draft = NotificationDraft::warning("Disk", "almost full")
            .with_duration_ms(1500)
            .with_data("source", Value::String("test".into()));

        assert_eq!(draft.kind, NotificationKind::Warning);
        assert_eq!(draft.duration, Some(Duration::from_millis(1500)));
        assert!(!draft.persistent);
        assert_eq!(draft.data["source"], "test");
    }
}
