//! Byte sources feeding the ingestion task

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::{GatewayError, Result};

/// Default read size of [`ReaderSource`].
pub const DEFAULT_READ_CHUNK: usize = 256;

/// Line condition reported by the serial driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineError {
    Parity,
    Framing,
    Overrun,
    /// The driver's receive buffer was full and bytes were lost.
    BufferFull,
}

/// Something the source observed on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Received bytes in arrival order
    Data(Vec<u8>),
    LineError(LineError),
}

/// Asynchronous source of received bytes.
///
/// Implementations own their timing: `next_event` waits until something arrives.
/// The ingestion task selects on it alongside its tick, so implementations must be
/// cancel-safe.
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Returns:
    /// - `Ok(Some(event))` - bytes or a line error
    /// - `Ok(None)` - the source is closed
    /// - `Err(e)` - transient failure, retried with backoff
    async fn next_event(&mut self) -> Result<Option<SourceEvent>>;
}

/// Source fed through an in-process channel, typically by a serial interrupt bridge or a test.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<SourceEvent>>,
}

/// Sending half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct SourceFeeder {
    tx: mpsc::Sender<Result<SourceEvent>>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> (SourceFeeder, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (SourceFeeder { tx }, Self { rx })
    }
}

#[async_trait::async_trait]
impl ByteSource for ChannelSource {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        match self.rx.recv().await {
            Some(event) => event.map(Some),
            None => Ok(None),
        }
    }
}

impl SourceFeeder {
    pub async fn send_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Ok(SourceEvent::Data(bytes.into()))).await
    }

    pub async fn send_line_error(&self, error: LineError) -> Result<()> {
        self.send(Ok(SourceEvent::LineError(error))).await
    }

    /// Inject a transient failure.
    pub async fn send_error(&self, error: GatewayError) -> Result<()> {
        self.send(Err(error)).await
    }

    async fn send(&self, event: Result<SourceEvent>) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| GatewayError::ChannelClosed { channel: "byte source" })
    }
}

/// Source reading from any async byte stream, such as a serial port or a socket.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    buf: Box<[u8]>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_READ_CHUNK)
    }

    pub fn with_chunk_size(reader: R, chunk: usize) -> Self {
        Self { reader, buf: vec![0; chunk.max(1)].into_boxed_slice() }
    }
}

#[async_trait::async_trait]
impl<R> ByteSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        let read = self.reader.read(&mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(SourceEvent::Data(self.buf[..read].to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_delivers_in_order_then_closes() {
        let (feeder, mut source) = ChannelSource::new(4);
        feeder.send_bytes([1u8, 2]).await.unwrap();
        feeder.send_line_error(LineError::Parity).await.unwrap();
        feeder.send_error(GatewayError::source_failed("glitch")).await.unwrap();
        drop(feeder);

        assert_eq!(source.next_event().await.unwrap(), Some(SourceEvent::Data(vec![1, 2])));
        assert_eq!(
            source.next_event().await.unwrap(),
            Some(SourceEvent::LineError(LineError::Parity))
        );
        assert!(source.next_event().await.unwrap_err().is_retryable());
        assert_eq!(source.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_source_chunks_until_eof() {
        let data: &[u8] = &[1, 2, 3, 4, 5];
        let mut source = ReaderSource::with_chunk_size(data, 2);

        let mut received = Vec::new();
        while let Some(event) = source.next_event().await.unwrap() {
            let SourceEvent::Data(bytes) = event else { panic!("unexpected {event:?}") };
            assert!(bytes.len() <= 2);
            received.extend(bytes);
        }
        assert_eq!(received, data);
    }
}
