//! 配置加载
//!
//! 读取优先级（后者覆盖前者）：
//! 1. 默认值
//! 2. 配置文件 `~/.config/service-notifier/config.json`
//! 3. 环境变量 `SNOTIFY_BASE_URL`
//! 4. 命令行参数（由调用方覆盖）

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 配置目录名
pub const APP_DIR: &str = "service-notifier";

/// 服务地址环境变量
pub const BASE_URL_ENV: &str = "SNOTIFY_BASE_URL";

/// 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// 通知容量
    pub capacity: usize,
    pub default_duration_ms: u64,
    pub health_interval_secs: u64,
    pub status_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub enable_connectivity: bool,
    pub enable_resources: bool,
    pub enable_realtime: bool,
    /// 显著负载变化
    pub load_delta_threshold: f64,
    /// 高负载线
    pub high_load_threshold: f64,
    /// 资源从响应中消失时是否上报
    pub report_missing_resources: bool,
    pub desktop_notifications: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            capacity: 5,
            default_duration_ms: 5000,
            health_interval_secs: 30,
            status_interval_secs: 60,
            reconnect_delay_secs: 5,
            request_timeout_secs: 10,
            enable_connectivity: true,
            enable_resources: true,
            enable_realtime: true,
            load_delta_threshold: 20.0,
            high_load_threshold: 80.0,
            report_missing_resources: true,
            desktop_notifications: false,
        }
    }
}

impl ServiceConfig {
    /// 配置目录 `~/.config/service-notifier`
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    /// 默认配置文件路径
    pub fn path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 从默认位置和环境变量加载
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Using {} from environment", BASE_URL_ENV);
                config.base_url = url;
            }
        }
        Ok(config)
    }

    /// 从指定文件加载，文件不存在时使用默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
