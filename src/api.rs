//! 服务端 HTTP 客户端
//!
//! - `GET /api/health`：任何 2xx 视为健康
//! - `GET /api/models/status`：resource id -> `{name, available, load}`

use crate::monitor::connectivity::HealthProbe;
use crate::monitor::resource::{StatusSnapshot, StatusSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// API 客户端配置
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// 服务地址（如 http://localhost:3000）
    pub base_url: String,
    /// 超时时间 (秒)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// API 客户端
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(anyhow!("base_url is required"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 健康检查，非 2xx 返回错误
    pub async fn health(&self) -> Result<()> {
        let url = self.endpoint("/api/health");
        let response = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| format!("Health check request to {} failed", url))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("Health check failed: {}", response.status()))
        }
    }

    /// 获取资源状态
    pub async fn models_status(&self) -> Result<StatusSnapshot> {
        let url = self.endpoint("/api/models/status");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Status request to {} failed", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("Model status check failed: {}", response.status()));
        }

        response
            .json::<StatusSnapshot>()
            .await
            .context("Failed to parse model status response")
    }
}

#[async_trait]
impl HealthProbe for ApiClient {
    async fn check(&self) -> bool {
        match self.health().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch(&self) -> Result<StatusSnapshot> {
        self.models_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_api_client_requires_base_url() {
        let config = ApiConfig {
            base_url: "  ".to_string(),
            ..Default::default()
        };

        let result = ApiClient::new(config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = ApiClient::new(ApiConfig {
            base_url: "http://example.test/".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(client.endpoint("/api/health"), "http://example.test/api/health");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let client = ApiClient::new(ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        assert!(!client.check().await);
        assert!(client.fetch().await.is_err());
    }
}
