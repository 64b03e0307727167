//! Running gateway handle

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, GatewayConfig};
use crate::driver::{Driver, DriverOptions};
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::protocol::ProtocolConfig;
use crate::sink::ResultSink;
use crate::source::ByteSource;
use crate::stream::ThrottleExt;
use crate::types::{ExtractedFrame, FieldTable, UpdateRate};
use crate::Result;

/// A running gateway: ingestion and extraction tasks plus their shared configuration.
///
/// Dropping the handle cancels both tasks.
///
/// ```rust,no_run
/// # async fn run() -> serialgate::Result<()> {
/// use serialgate::{Gateway, GatewayConfig, NullSink, ReaderSource};
///
/// let config = GatewayConfig::load("gateway.yaml")?;
/// let port = tokio::io::empty();
/// let gateway = Gateway::spawn(&config, ReaderSource::new(port), NullSink)?;
/// println!("{:?}", gateway.metrics());
/// gateway.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Gateway {
    store: ConfigStore,
    metrics: Arc<GatewayMetrics>,
    latest: watch::Receiver<Option<Arc<ExtractedFrame>>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    /// Start a gateway from a validated configuration.
    pub fn spawn<S, K>(config: &GatewayConfig, source: S, sink: K) -> Result<Self>
    where
        S: ByteSource,
        K: ResultSink,
    {
        let store = ConfigStore::new(config.protocol.clone(), config.field_table()?)?;
        Self::spawn_with(store, source, sink, DriverOptions::from(config))
    }

    /// Start a gateway around an existing store.
    pub fn spawn_with<S, K>(
        store: ConfigStore,
        source: S,
        sink: K,
        options: DriverOptions,
    ) -> Result<Self>
    where
        S: ByteSource,
        K: ResultSink,
    {
        let metrics = Arc::new(GatewayMetrics::new());
        info!(
            protocol = %store.protocol().kind(),
            fields = store.field_table().len(),
            queue_depth = options.queue_depth,
            "Starting gateway"
        );
        let channels = Driver::spawn(source, sink, store.clone(), metrics.clone(), options)?;

        Ok(Self {
            store,
            metrics,
            latest: channels.latest,
            cancel: channels.cancel,
            tasks: vec![channels.ingestion, channels.extraction],
        })
    }

    /// Swap the protocol. The in-progress frame is discarded; the next byte is framed
    /// under the new settings.
    pub fn replace_protocol(&self, protocol: ProtocolConfig) -> Result<()> {
        self.store.replace_protocol(protocol)
    }

    /// Swap the field table. Frames already being extracted keep the previous table.
    pub fn replace_field_table(&self, fields: FieldTable) {
        self.store.replace_field_table(fields);
    }

    pub fn protocol(&self) -> Arc<ProtocolConfig> {
        self.store.protocol()
    }

    pub fn field_table(&self) -> Arc<FieldTable> {
        self.store.field_table()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Most recently extracted frame, if any.
    pub fn latest(&self) -> Option<Arc<ExtractedFrame>> {
        self.latest.borrow().clone()
    }

    /// Subscribe to extracted frames.
    ///
    /// The stream is latest-wins: a slow consumer sees the newest frame, not a backlog.
    /// Use a [`ResultSink`] to receive every frame.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<ExtractedFrame>> + 'static {
        let frames = WatchStream::new(self.latest.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => frames.boxed(),
            Some(period) => frames.throttle(period).boxed(),
        }
    }

    /// Whether both tasks are still running.
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|task| !task.is_finished())
    }

    /// Cancel both tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Gateway task failed: {}", e);
            }
        }
        info!("Gateway stopped");
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        debug!("Dropping gateway");
        self.cancel.cancel();
    }
}
