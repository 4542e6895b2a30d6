//! 安装提示状态 - 记录用户关闭安装提示的时间，7 天内不再提示
//!
//! 这是整个子系统中唯一持久化的状态。

use crate::config::ServiceConfig;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::debug;

/// 关闭后的静默天数
pub const SUPPRESS_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PromptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    install_prompt_dismissed_at: Option<DateTime<Utc>>,
}

/// 安装提示状态
pub struct PromptState {
    path: PathBuf,
}

impl PromptState {
    /// 使用默认路径 `~/.config/service-notifier/prompt_state.json`
    pub fn new() -> Self {
        Self::with_path(ServiceConfig::config_dir().join("prompt_state.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// 上次关闭时间，文件不存在或损坏时返回 None
    pub fn dismissed_at(&self) -> Option<DateTime<Utc>> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<PromptRecord>(&content) {
            Ok(record) => record.install_prompt_dismissed_at,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring unreadable prompt state");
                None
            }
        }
    }

    /// 是否应该显示安装提示
    pub fn should_prompt(&self, now: DateTime<Utc>) -> bool {
        match self.dismissed_at() {
            Some(at) => now - at >= Duration::days(SUPPRESS_DAYS),
            None => true,
        }
    }

    /// 记录关闭时间（带文件锁）
    pub fn dismiss(&self, now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file: File = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let mut record: PromptRecord = serde_json::from_str(&content).unwrap_or_default();
        record.install_prompt_dismissed_at = Some(now);

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string_pretty(&record)?.as_bytes())?;
        file.unlock()?;
        Ok(())
    }
}

impl Default for PromptState {
    fn default() -> Self {
        Self::new()
    }
}
