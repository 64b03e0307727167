//! Result sinks receiving extracted frames

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::types::ExtractedFrame;
use crate::{GatewayError, Result};

/// Destination of extracted frames, called once per frame in sequence order.
///
/// An error is counted and logged; the frame is not retried.
#[async_trait::async_trait]
pub trait ResultSink: Send + 'static {
    async fn publish(&mut self, frame: Arc<ExtractedFrame>) -> Result<()>;
}

#[async_trait::async_trait]
impl ResultSink for mpsc::Sender<Arc<ExtractedFrame>> {
    async fn publish(&mut self, frame: Arc<ExtractedFrame>) -> Result<()> {
        self.send(frame).await.map_err(|_| GatewayError::sink_failed("result receiver dropped"))
    }
}

#[async_trait::async_trait]
impl ResultSink for mpsc::UnboundedSender<Arc<ExtractedFrame>> {
    async fn publish(&mut self, frame: Arc<ExtractedFrame>) -> Result<()> {
        self.send(frame).map_err(|_| GatewayError::sink_failed("result receiver dropped"))
    }
}

/// Sink that discards every frame; results are still visible through the latest-frame watch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl ResultSink for NullSink {
    async fn publish(&mut self, _frame: Arc<ExtractedFrame>) -> Result<()> {
        Ok(())
    }
}
