//! 桌面通知 - 把重要通知转发给系统通知中心
//!
//! 尽力而为：命令不存在或执行失败都只记录 debug 日志。

use super::model::Notification;
use super::store::{NotificationStore, Subscription};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// 桌面通知转发器
pub struct DesktopNotifier {
    program: String,
    platform: Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    Linux,
    MacOs,
}

impl DesktopNotifier {
    /// 按当前平台选择通知命令
    pub fn new() -> Self {
        if cfg!(target_os = "macos") {
            Self { program: "osascript".to_string(), platform: Platform::MacOs }
        } else {
            Self { program: "notify-send".to_string(), platform: Platform::Linux }
        }
    }

    /// 自定义通知命令（参数格式同 notify-send）
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into(), platform: Platform::Linux }
    }

    /// 只转发 error / warning
    pub fn should_forward(notification: &Notification) -> bool {
        notification.kind.is_alert()
    }

    fn args(&self, notification: &Notification) -> Vec<String> {
        match self.platform {
            Platform::Linux => vec![notification.title.clone(), notification.message.clone()],
            Platform::MacOs => vec![
                "-e".to_string(),
                format!(
                    "display notification {:?} with title {:?}",
                    notification.message, notification.title
                ),
            ],
        }
    }

    /// 异步发送（spawn 后立即返回），失败被忽略
    ///
    /// 子进程由后台任务等待退出，返回该任务句柄；没有运行时或启动失败时返回 None。
    pub fn show(&self, notification: &Notification) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!("No async runtime available, desktop notification skipped");
                return None;
            }
        };

        let result = Command::new(&self.program)
            .args(self.args(notification))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match result {
            Ok(child) => child,
            Err(e) => {
                debug!(program = %self.program, error = %e, "Desktop notification skipped");
                return None;
            }
        };

        let program = self.program.clone();
        Some(runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    debug!(program = %program, %status, "Desktop notifier exited with failure");
                }
                Ok(_) => {}
                Err(e) => debug!(program = %program, error = %e, "Failed to wait for desktop notifier"),
            }
        }))
    }

    /// 订阅 store，每当出现新的头部条目时转发
    pub fn attach(self, store: &NotificationStore) -> Subscription {
        let last_seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        store.subscribe(move |list| {
            let Some(latest) = list.first() else {
                return;
            };
            let mut last = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(latest.id.as_str()) {
                return;
            }
            *last = Some(latest.id.clone());
            if Self::should_forward(latest) {
                let _ = self.show(latest);
            }
        })
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::NotificationDraft;

    #[tokio::test]
    async fn test_missing_program_is_ignored() {
        let store = NotificationStore::new();
        let _sub = DesktopNotifier::with_program("/nonexistent/notifier-binary").attach(&store);

        store.add(NotificationDraft::error("Boom", "failed"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_forwards_only_alerts() {
        let store = NotificationStore::new();
        let info = store.add(NotificationDraft::info("i", "m"));
        let warn = store.add(NotificationDraft::warning("w", "m"));

        assert!(!DesktopNotifier::should_forward(&store.get(&info).unwrap()));
        assert!(DesktopNotifier::should_forward(&store.get(&warn).unwrap()));
    }

    #[tokio::test]
    async fn test_spawned_notifier_is_waited_on() {
        let store = NotificationStore::new();
        let id = store.add(NotificationDraft::warning("Disk", "almost full"));
        let notifier = DesktopNotifier::with_program("true");

        let reaper = notifier.show(&store.get(&id).unwrap()).expect("child spawned");
        // 子进程退出后等待任务结束，不留僵尸进程
        reaper.await.unwrap();
    }

    #[test]
    fn test_show_without_runtime_is_skipped() {
        let store = NotificationStore::new();
        let id = store.add(NotificationDraft::error("Boom", "failed").persistent());
        let notifier = DesktopNotifier::with_program("true");
        assert!(notifier.show(&store.get(&id).unwrap()).is_none());
    }

    #[test]
    fn test_linux_args() {
        let store = NotificationStore::new();
        let id = store.add(NotificationDraft::error("Title", "Body").persistent());
        let notifier = DesktopNotifier::with_program("notify-send");
        assert_eq!(notifier.args(&store.get(&id).unwrap()), vec!["Title", "Body"]);
    }
}
