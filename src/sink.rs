use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::message::DecodedMessage;

/// Destination for decoded messages.
///
/// Publishing is best effort: a sink reports failure by returning `false`
/// and the message is not retried.
#[async_trait]
pub trait OutputSink: Send {
    /// Delivers one message.
    async fn publish(&mut self, message: &DecodedMessage) -> bool;

    /// Flushes buffered output; called once when the gateway stops.
    async fn flush(&mut self) {}
}

/// Writes each message as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> OutputSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&mut self, message: &DecodedMessage) -> bool {
        let mut line = match serde_json::to_vec(message) {
            Ok(line) => line,
            Err(error) => {
                warn!(%error, "failed to serialise decoded message");
                return false;
            }
        };
        line.push(b'\n');
        match self.writer.write_all(&line).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "failed to write decoded message");
                false
            }
        }
    }

    async fn flush(&mut self) {
        if let Err(error) = self.writer.flush().await {
            warn!(%error, "failed to flush output");
        }
    }
}

/// Collects messages in memory.
///
/// Clones share the same buffer, so a clone kept by the caller observes
/// everything published through the gateway.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<DecodedMessage>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every message published so far.
    #[must_use]
    pub fn messages(&self) -> Vec<DecodedMessage> {
        self.messages.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn publish(&mut self, message: &DecodedMessage) -> bool {
        self.messages.lock().push(message.clone());
        true
    }
}
