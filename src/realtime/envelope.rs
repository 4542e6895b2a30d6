//! 实时事件信封 - `type` 字段区分的 JSON 消息
//!
//! 已知类型映射到预设通知，未知类型走通用分支，直接转发 title / message 等字段。

use crate::notification::{presets, NotificationDraft, NotificationKind};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// 已知事件类型
pub const KNOWN_TYPES: &[&str] = &[
    "app_created",
    "deployment_complete",
    "model_switched",
    "rate_limit",
    "storage_warning",
    "update_available",
    "maintenance_mode",
    "feature_unlocked",
    "error",
];

/// 已知事件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownEvent {
    AppCreated {
        #[serde(rename = "appName")]
        app_name: String,
    },
    DeploymentComplete {
        #[serde(rename = "appName")]
        app_name: String,
    },
    ModelSwitched {
        #[serde(rename = "modelName")]
        model_name: String,
    },
    RateLimit {
        #[serde(rename = "resetTime")]
        reset_time: String,
    },
    StorageWarning {
        percentage: f64,
    },
    UpdateAvailable {
        version: String,
    },
    MaintenanceMode {
        #[serde(rename = "endTime")]
        end_time: String,
    },
    FeatureUnlocked {
        feature: String,
    },
    Error {
        service: String,
    },
}

/// 未知类型的通用事件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// 可选的通知类型，缺省为 info
    #[serde(default)]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// 毫秒
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub persistent: bool,
}

/// 解析后的实时事件
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Known(KnownEvent),
    Other(GenericEvent),
}

impl RealtimeEvent {
    /// 解析原始 JSON 信封
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("envelope is not valid JSON")?;
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("envelope has no type field"))?
            .to_string();

        if KNOWN_TYPES.contains(&event_type.as_str()) {
            let event = serde_json::from_value(value)
                .with_context(|| format!("invalid {} envelope", event_type))?;
            Ok(RealtimeEvent::Known(event))
        } else {
            let event = serde_json::from_value(value)
                .with_context(|| format!("invalid generic envelope ({})", event_type))?;
            Ok(RealtimeEvent::Other(event))
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            RealtimeEvent::Known(known) => known.event_type(),
            RealtimeEvent::Other(generic) => &generic.event_type,
        }
    }

    /// 分发表：事件 -> 通知
    pub fn into_draft(self) -> NotificationDraft {
        match self {
            RealtimeEvent::Known(known) => known.into_draft(),
            RealtimeEvent::Other(generic) => generic.into_draft(),
        }
    }
}

impl KnownEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            KnownEvent::AppCreated { .. } => "app_created",
            KnownEvent::DeploymentComplete { .. } => "deployment_complete",
            KnownEvent::ModelSwitched { .. } => "model_switched",
            KnownEvent::RateLimit { .. } => "rate_limit",
            KnownEvent::StorageWarning { .. } => "storage_warning",
            KnownEvent::UpdateAvailable { .. } => "update_available",
            KnownEvent::MaintenanceMode { .. } => "maintenance_mode",
            KnownEvent::FeatureUnlocked { .. } => "feature_unlocked",
            KnownEvent::Error { .. } => "error",
        }
    }

    pub fn into_draft(self) -> NotificationDraft {
        match self {
            KnownEvent::AppCreated { app_name } => presets::app_created(&app_name),
            KnownEvent::DeploymentComplete { app_name } => presets::deployment_complete(&app_name),
            KnownEvent::ModelSwitched { model_name } => presets::model_switched(&model_name),
            KnownEvent::RateLimit { reset_time } => presets::rate_limit(&reset_time),
            KnownEvent::StorageWarning { percentage } => presets::storage_warning(percentage),
            KnownEvent::UpdateAvailable { version } => presets::update_available(&version),
            KnownEvent::MaintenanceMode { end_time } => presets::maintenance_mode(&end_time),
            KnownEvent::FeatureUnlocked { feature } => presets::feature_unlocked(&feature),
            KnownEvent::Error { service } => presets::api_error(&service),
        }
    }
}

impl GenericEvent {
    pub fn into_draft(self) -> NotificationDraft {
        let kind = self
            .notification_type
            .as_deref()
            .and_then(NotificationKind::parse)
            .unwrap_or(NotificationKind::Info);

        let mut draft = NotificationDraft::new(kind, self.title, self.message);
        if let Some(millis) = self.duration {
            draft = draft.with_duration_ms(millis);
        }
        if self.persistent {
            draft = draft.persistent();
        }
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_known_envelopes_map_to_presets() {
        let event = RealtimeEvent::parse(r#"{"type":"app_created","appName":"demo"}"#).unwrap();
        assert_eq!(event, RealtimeEvent::Known(KnownEvent::AppCreated { app_name: "demo".into() }));
        let draft = event.into_draft();
        assert_eq!(draft.title, "App Created Successfully");
        assert_eq!(draft.kind, NotificationKind::Success);

        let draft = RealtimeEvent::parse(r#"{"type":"storage_warning","percentage":91}"#)
            .unwrap()
            .into_draft();
        assert_eq!(draft.message, "Storage usage is at 91%. Consider freeing up space.");

        let draft = RealtimeEvent::parse(r#"{"type":"update_available","version":"2.1.0"}"#)
            .unwrap()
            .into_draft();
        assert_eq!(draft.kind, NotificationKind::System);
        assert!(draft.persistent);

        let draft = RealtimeEvent::parse(r#"{"type":"error","service":"billing"}"#)
            .unwrap()
            .into_draft();
        assert_eq!(draft.title, "API Error");
    }

    #[test]
    fn test_every_known_type_parses() {
        let samples = [
            r#"{"type":"app_created","appName":"a"}"#,
            r#"{"type":"deployment_complete","appName":"a"}"#,
            r#"{"type":"model_switched","modelName":"m"}"#,
            r#"{"type":"rate_limit","resetTime":"5 minutes"}"#,
            r#"{"type":"storage_warning","percentage":80.5}"#,
            r#"{"type":"update_available","version":"1.0"}"#,
            r#"{"type":"maintenance_mode","endTime":"18:00"}"#,
            r#"{"type":"feature_unlocked","feature":"Teams"}"#,
            r#"{"type":"error","service":"api"}"#,
        ];
        for (raw, expected) in samples.iter().zip(KNOWN_TYPES) {
            let event = RealtimeEvent::parse(raw).unwrap();
            assert!(matches!(event, RealtimeEvent::Known(_)), "{}", raw);
            assert_eq!(event.event_type(), *expected);
        }
    }

    #[test]
    fn test_unknown_type_uses_generic_fields() {
        let raw = r#"{"type":"quota_reset","title":"Quota","message":"Reset done","duration":2000}"#;
        let draft = RealtimeEvent::parse(raw).unwrap().into_draft();
        assert_eq!(draft.kind, NotificationKind::Info);
        assert_eq!(draft.title, "Quota");
        assert_eq!(draft.duration, Some(Duration::from_millis(2000)));
        assert!(!draft.persistent);

        let raw = r#"{"type":"incident","notificationType":"error","title":"Down","message":"x","persistent":true}"#;
        let draft = RealtimeEvent::parse(raw).unwrap().into_draft();
        assert_eq!(draft.kind, NotificationKind::Error);
        assert!(draft.persistent);
    }

    #[test]
    fn test_malformed_envelopes_are_errors() {
        assert!(RealtimeEvent::parse("not json").is_err());
        assert!(RealtimeEvent::parse(r#"{"title":"no type"}"#).is_err());
        // 已知类型缺字段
        assert!(RealtimeEvent::parse(r#"{"type":"app_created"}"#).is_err());
    }
}
