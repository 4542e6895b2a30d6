//! 实时事件 - SSE 长连接、信封解析和分发

pub mod client;
pub mod envelope;
pub mod sse;

pub use client::{EventSource, MessageStream, RealtimeEventClient, RealtimeHandle, RealtimeState};
pub use envelope::{GenericEvent, KnownEvent, RealtimeEvent};
pub use sse::{SseDecoder, SseEvent, SseEventSource};
