use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::FeedError;
use crate::types::PriceUpdate;

/// Consumer of flushed batches.
///
/// Failures are logged by the cache and never retried; a sink that needs
/// retries must implement them itself.
#[async_trait]
pub trait PriceSink: Send + Sync {
    async fn flush(&self, batch: Vec<PriceUpdate>) -> Result<(), FeedError>;
}

/// Logs every flushed batch.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl PriceSink for LogSink {
    async fn flush(&self, batch: Vec<PriceUpdate>) -> Result<(), FeedError> {
        info!(sink = %self.name, records = batch.len(), "flushed batch");
        for update in &batch {
            tracing::debug!(sink = %self.name, "{update}");
        }
        Ok(())
    }
}

/// Forwards batches to a tokio channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<PriceUpdate>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<PriceUpdate>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PriceSink for ChannelSink {
    async fn flush(&self, batch: Vec<PriceUpdate>) -> Result<(), FeedError> {
        self.tx
            .send(batch)
            .map_err(|_| FeedError::Sink("receiver dropped".into()))
    }
}
