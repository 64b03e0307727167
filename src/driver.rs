//! Driver spawns and manages the ingestion and extraction tasks

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::assembler::{AssemblerEvent, DEFAULT_FRAME_CAPACITY, FrameAssembler};
use crate::config::{ConfigStore, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_DEPTH, GatewayConfig};
use crate::extract::extract;
use crate::metrics::GatewayMetrics;
use crate::protocol::ProtocolKind;
use crate::sink::ResultSink;
use crate::source::{ByteSource, LineError, SourceEvent};
use crate::types::{ExtractedFrame, FrameMetadata, FramePacket};
use crate::{GatewayError, Result};

/// Consecutive source errors after which ingestion gives up.
const MAX_SOURCE_ERRORS: u32 = 10;

/// Sizing and timing of the driver tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub frame_capacity: usize,
    pub queue_depth: usize,
    /// Tick on which silence rules are evaluated
    pub poll_interval: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl From<&GatewayConfig> for DriverOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            frame_capacity: config.frame_capacity,
            queue_depth: config.queue_depth,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Most recent extracted frame
    pub latest: watch::Receiver<Option<Arc<ExtractedFrame>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    pub ingestion: JoinHandle<()>,
    pub extraction: JoinHandle<()>,
}

/// Driver spawns and manages the gateway tasks
///
/// The ingestion task owns the byte source and the frame assembler; the extraction task
/// owns the result sink. Verified frames travel between them through a bounded queue
/// that drops the newest frame when full.
pub struct Driver;

impl Driver {
    /// Spawn driver tasks. Must be called inside a tokio runtime.
    pub fn spawn<S, K>(
        source: S,
        sink: K,
        store: ConfigStore,
        metrics: Arc<GatewayMetrics>,
        options: DriverOptions,
    ) -> Result<DriverChannels>
    where
        S: ByteSource,
        K: ResultSink,
    {
        if options.queue_depth == 0 {
            return Err(GatewayError::invalid_argument("queue depth must be non-zero"));
        }
        if options.poll_interval.is_zero() {
            return Err(GatewayError::invalid_argument("poll interval must be non-zero"));
        }
        let assembler = FrameAssembler::with_capacity(store.protocol(), options.frame_capacity)?;

        let (queue_tx, queue_rx) = mpsc::channel(options.queue_depth);
        let (latest_tx, latest_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let ingestion = tokio::spawn(Self::ingestion_task(
            source,
            assembler,
            store.clone(),
            queue_tx,
            metrics.clone(),
            options.poll_interval,
            cancel.clone(),
        ));
        let extraction = tokio::spawn(Self::extraction_task(
            sink,
            store,
            queue_rx,
            latest_tx,
            metrics,
            cancel.clone(),
        ));

        Ok(DriverChannels { latest: latest_rx, cancel, ingestion, extraction })
    }

    /// Ingestion task - feeds bytes to the assembler and queues verified frames
    async fn ingestion_task<S>(
        mut source: S,
        mut assembler: FrameAssembler,
        store: ConfigStore,
        queue: mpsc::Sender<FramePacket>,
        metrics: Arc<GatewayMetrics>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) where
        S: ByteSource,
    {
        info!(protocol = %assembler.config().kind(), "Ingestion task started");
        let mut protocol_rx = store.watch_protocol();
        protocol_rx.mark_unchanged();
        drop(store);
        let mut protocol_open = true;

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut error_count = 0u32;
        let mut chunks = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Ingestion cancelled");
                    break;
                }
                changed = protocol_rx.changed(), if protocol_open => {
                    if changed.is_err() {
                        protocol_open = false;
                        continue;
                    }
                    let config = protocol_rx.borrow_and_update().clone();
                    let discarded = assembler.reconfigure(config);
                    metrics.record_discarded(discarded);
                }
                result = source.next_event() => match result {
                    Ok(Some(SourceEvent::Data(bytes))) => {
                        error_count = 0;
                        chunks += 1;
                        trace!(chunk = chunks, len = bytes.len(), "Bytes received");
                        let events = assembler.push(&bytes, now());
                        Self::dispatch(events, assembler.config().kind(), &queue, &metrics);
                    }
                    Ok(Some(SourceEvent::LineError(line_error))) => {
                        error_count = 0;
                        metrics.record_line_error();
                        warn!(?line_error, "Line error reported by source");
                        if matches!(line_error, LineError::Overrun | LineError::BufferFull) {
                            metrics.record_discarded(assembler.reset());
                        }
                    }
                    Ok(None) => {
                        info!(chunks, buffered = assembler.buffered(), "Byte source closed");
                        let events = assembler.flush();
                        Self::dispatch(events, assembler.config().kind(), &queue, &metrics);
                        break;
                    }
                    Err(e) => {
                        error_count += 1;
                        error!("Byte source error ({}/{}): {}", error_count, MAX_SOURCE_ERRORS, e);

                        if error_count >= MAX_SOURCE_ERRORS {
                            error!("Too many byte source errors, stopping ingestion");
                            break;
                        }

                        // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                        let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                },
                _ = ticker.tick() => {
                    let events = assembler.poll(now());
                    Self::dispatch(events, assembler.config().kind(), &queue, &metrics);
                }
            }
        }

        let stats = assembler.stats();
        info!(
            frames = stats.frames_received,
            failed = stats.frames_failed,
            overflows = stats.overflows,
            "Ingestion task ended"
        );
    }

    fn dispatch(
        events: Vec<AssemblerEvent>,
        protocol: ProtocolKind,
        queue: &mpsc::Sender<FramePacket>,
        metrics: &GatewayMetrics,
    ) {
        for event in events {
            metrics.record_assembler_event(&event);
            let AssemblerEvent::Frame(frame) = event else {
                continue;
            };
            let checksum_verified = frame.checksum_verified();
            let packet = FramePacket::new(frame.data, checksum_verified, protocol);
            match queue.try_send(packet) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(packet)) => {
                    metrics.record_queue_drop();
                    warn!(%protocol, len = packet.len(), "Extraction queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Extraction queue closed, dropping frame");
                }
            }
        }
    }

    /// Extraction task - applies the field table and publishes results
    async fn extraction_task<K>(
        mut sink: K,
        store: ConfigStore,
        mut queue: mpsc::Receiver<FramePacket>,
        latest: watch::Sender<Option<Arc<ExtractedFrame>>>,
        metrics: Arc<GatewayMetrics>,
        cancel: CancellationToken,
    ) where
        K: ResultSink,
    {
        info!("Extraction task started");
        let mut sequence = 0u32;

        loop {
            let packet = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Extraction cancelled");
                    break;
                }
                packet = queue.recv() => match packet {
                    Some(packet) => packet,
                    None => {
                        debug!("Extraction queue closed");
                        break;
                    }
                },
            };

            // One snapshot per frame; a concurrent swap applies to the next frame
            let table = store.field_table();
            let fields = match extract(&packet.data, &table) {
                Ok(fields) => fields,
                Err(e) => {
                    metrics.record_extraction_failure();
                    warn!(len = packet.len(), "Field extraction failed: {}", e);
                    continue;
                }
            };

            sequence = sequence.wrapping_add(1);
            let frame = Arc::new(ExtractedFrame {
                metadata: FrameMetadata {
                    sequence,
                    raw_length: packet.len(),
                    checksum_verified: packet.checksum_verified,
                    protocol: packet.protocol,
                },
                raw: packet.data,
                fields,
            });
            debug!(sequence, fields = frame.fields.len(), "Frame extracted");

            latest.send_replace(Some(frame.clone()));
            match sink.publish(frame).await {
                Ok(()) => metrics.record_published(),
                Err(e) => {
                    metrics.record_sink_error();
                    warn!(sequence, "Result sink failed: {}", e);
                }
            }
        }

        info!(frames = sequence, "Extraction task ended");
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
