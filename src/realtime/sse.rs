//! Server-Sent Events 解码和 HTTP 事件源

use super::client::{EventSource, MessageStream};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{future, stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// 一条完整的 SSE 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` 字段，None 表示默认的 message
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// 是否为默认 message 事件
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// 行解码器，可以处理被任意切分的字节块
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一个字节块，返回其中完成的事件
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

/// 基于 HTTP 的 SSE 事件源（`GET /api/events`）
pub struct SseEventSource {
    client: Client,
    url: String,
}

impl SseEventSource {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        // 流式连接不设总超时，只限制建连
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/api/events", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for SseEventSource {
    async fn connect(&self) -> Result<MessageStream> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?
            .error_for_status()?;

        let messages = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items: Vec<Result<String>> = match chunk {
                    Ok(bytes) => decoder
                        .feed(&bytes)
                        .into_iter()
                        .filter(|event| {
                            if !event.is_message() {
                                debug!(event = ?event.event, "Ignoring named SSE event");
                            }
                            event.is_message()
                        })
                        .map(|event| Ok(event.data))
                        .collect(),
                    Err(e) => vec![Err(anyhow::Error::new(e).context("event stream read failed"))],
                };
                future::ready(Some(stream::iter(items)))
            })
            .flatten();

        Ok(messages.boxed())
    }
}
