//! 通知预设 - 领域事件到通知内容的纯映射
//!
//! 这里只负责文案，不做任何 I/O。动作回调只记录日志，真正的导航由展示层处理。

use super::model::{NotificationAction, NotificationDraft};
use std::time::Duration;
use tracing::info;

/// 慢操作阈值
pub const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_secs(3);

pub fn app_created(app_name: &str) -> NotificationDraft {
    let target = app_name.to_string();
    NotificationDraft::success(
        "App Created Successfully",
        format!("Your app \"{}\" has been created and is ready to use.", app_name),
    )
    .with_action(NotificationAction::new("Open App", move || {
        info!(app = %target, "Open app requested");
    }))
}

pub fn model_switched(model_name: &str) -> NotificationDraft {
    NotificationDraft::info(
        "Model Switched",
        format!("Successfully switched to {} model.", model_name),
    )
}

pub fn deployment_complete(app_name: &str) -> NotificationDraft {
    NotificationDraft::success(
        "Deployment Complete",
        format!("App \"{}\" has been deployed successfully.", app_name),
    )
}

/// 健康检查失败（之前在线）
pub fn connection_lost() -> NotificationDraft {
    NotificationDraft::error(
        "Connection Lost",
        "Lost connection to the server. Please check your internet connection.",
    )
    .persistent()
}

/// 健康检查恢复
pub fn connection_restored() -> NotificationDraft {
    NotificationDraft::success("Connection Restored", "Successfully connected to services.")
        .with_duration_ms(3000)
}

/// 系统网络断开信号
pub fn network_lost() -> NotificationDraft {
    NotificationDraft::warning(
        "Network Lost",
        "Internet connection has been lost. Some features may be unavailable.",
    )
    .persistent()
}

/// 系统网络恢复信号
pub fn network_restored() -> NotificationDraft {
    NotificationDraft::info("Network Restored", "Internet connection has been restored.")
        .with_duration_ms(3000)
}

pub fn api_error(service: &str) -> NotificationDraft {
    NotificationDraft::error(
        "API Error",
        format!("Failed to connect to {}. Please try again later.", service),
    )
}

pub fn save_failed(item: &str) -> NotificationDraft {
    NotificationDraft::error("Save Failed", format!("Failed to save {}. Please try again.", item))
}

pub fn rate_limit(reset_time: &str) -> NotificationDraft {
    NotificationDraft::warning(
        "Rate Limit Reached",
        format!("You've reached the rate limit. Resets in {}.", reset_time),
    )
}

pub fn storage_warning(percentage: f64) -> NotificationDraft {
    NotificationDraft::warning(
        "Storage Warning",
        format!(
            "Storage usage is at {}%. Consider freeing up space.",
            format_number(percentage)
        ),
    )
}

pub fn update_available(version: &str) -> NotificationDraft {
    let target = version.to_string();
    NotificationDraft::system(
        "Update Available",
        format!("Version {} is now available. Would you like to update?", version),
    )
    .persistent()
    .with_action(NotificationAction::new("Update Now", move || {
        info!(version = %target, "Update requested");
    }))
}

pub fn maintenance_mode(end_time: &str) -> NotificationDraft {
    NotificationDraft::system(
        "Maintenance Mode",
        format!(
            "System maintenance scheduled until {}. Some features may be unavailable.",
            end_time
        ),
    )
    .persistent()
}

pub fn welcome() -> NotificationDraft {
    NotificationDraft::info("Welcome!", "Get started by creating your first AI app.").with_action(
        NotificationAction::new("Create App", || {
            info!("Navigate to app creation");
        }),
    )
}

pub fn feature_unlocked(feature: &str) -> NotificationDraft {
    NotificationDraft::info("Feature Unlocked", format!("You can now use {}!", feature))
}

// ==================== 资源状态 ====================

/// 首次发现资源
pub fn resource_discovered(name: &str) -> NotificationDraft {
    NotificationDraft::info("Model Available", format!("{} model is now available.", name))
        .with_duration_ms(5000)
}

pub fn resource_restored(name: &str) -> NotificationDraft {
    NotificationDraft::success("Model Restored", format!("{} model is back online.", name))
        .with_duration_ms(5000)
}

pub fn resource_unavailable(name: &str) -> NotificationDraft {
    NotificationDraft::warning(
        "Model Unavailable",
        format!("{} model is currently unavailable.", name),
    )
    .with_duration_ms(10_000)
}

pub fn resource_high_load(name: &str, load: f64) -> NotificationDraft {
    NotificationDraft::warning(
        "High Model Load",
        format!("{} is experiencing high load ({}%).", name, format_number(load)),
    )
    .with_duration_ms(5000)
}

/// 资源不再出现在状态响应中
pub fn resource_missing(name: &str) -> NotificationDraft {
    NotificationDraft::warning(
        "Model Removed",
        format!("{} model is no longer reported by the server.", name),
    )
    .with_duration_ms(10_000)
}

// ==================== 错误与性能 ====================

/// 应用错误，常驻并提供反馈入口
pub fn application_error(context: Option<&str>, message: &str) -> NotificationDraft {
    let text = match context {
        Some(ctx) => format!("{}: {}", ctx, message),
        None => message.to_string(),
    };
    NotificationDraft::error("Application Error", text)
        .persistent()
        .with_action(NotificationAction::new("Report Issue", || {
            info!("Open support page requested");
        }))
}

/// 网络错误，按状态码选择文案
pub fn network_error(status: Option<u16>, operation: &str, online: bool) -> NotificationDraft {
    let message = match status {
        Some(429) => format!(
            "Rate limit exceeded for {}. Please try again later.",
            operation
        ),
        Some(code) if code >= 500 => {
            format!("Server error during {}. Please try again later.", operation)
        }
        _ if !online => "Network connection lost. Please check your internet connection.".to_string(),
        _ => format!("Failed to {}.", operation),
    };
    NotificationDraft::error("Network Error", message).with_duration_ms(10_000)
}

/// 慢操作提示，耗时未超过阈值时返回 None
pub fn slow_operation(name: &str, elapsed: Duration) -> Option<NotificationDraft> {
    if elapsed <= SLOW_OPERATION_THRESHOLD {
        return None;
    }
    let secs = (elapsed.as_millis() as f64 / 1000.0).round();
    Some(
        NotificationDraft::warning(
            "Slow Operation",
            format!("{} took {}s to complete.", name, secs),
        )
        .with_duration_ms(5000),
    )
}

/// 整数值不带小数点输出
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
