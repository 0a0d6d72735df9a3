//! Chat transport seam.
//!
//! The bot speaks NDJSON: one [`InboundEvent`] per stdin line, one
//! [`Reply`] per stdout line. Any chat gateway can be bridged over a pipe.

use std::sync::Arc;

use async_trait::async_trait;
use paygate_core::ndjson::{InboundEvent, Reply, encode_reply, parse_line};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;
use tracing::warn;

/// Outbound side of the chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, reply: Reply) -> paygate_core::Result<()>;
}

/// Writes replies as NDJSON lines.
pub struct NdjsonTransport<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> NdjsonTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl NdjsonTransport<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Transport for NdjsonTransport<W> {
    async fn send(&self, reply: Reply) -> paygate_core::Result<()> {
        let line = encode_reply(&reply)?;
        // One lock per line keeps concurrent replies from interleaving.
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Inbound NDJSON event stream.
pub struct EventStream<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next well-formed event, or `None` at end of input.
    ///
    /// Malformed lines are logged and skipped.
    pub async fn next_event(&mut self) -> paygate_core::Result<Option<InboundEvent>> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!(error = %e, "Skipping malformed event line"),
            }
        }
        Ok(None)
    }
}

/// Collects replies in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    replies: Arc<Mutex<Vec<Reply>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub async fn take(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.replies.lock().await)
    }

    /// Texts of all recorded replies, in send order.
    pub async fn texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .await
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, reply: Reply) -> paygate_core::Result<()> {
        self.replies.lock().await.push(reply);
        Ok(())
    }
}
