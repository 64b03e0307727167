//! Serial field-gateway core.
//!
//! Serialgate turns a raw serial byte stream into typed, scaled field values:
//!
//! - **Framing**: incremental frame assembly for custom framed protocols, Modbus RTU,
//!   Modbus ASCII, NMEA 0183 and IEC 60870-5-101
//! - **Integrity**: eleven checksum algorithms plus per-protocol verification
//! - **Extraction**: a compact 12-byte descriptor table maps payload bytes to named fields
//!   with fixed-point scaling
//! - **Runtime**: tokio ingestion and extraction tasks, a lossy bounded queue between them,
//!   hot-swappable protocol and field configuration, and lock-free counters
//!
//! The framing and extraction layers are plain synchronous functions and can be used
//! without the runtime.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use serialgate::{ExtractedFrame, Gateway, GatewayConfig, ReaderSource, UpdateRate};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> serialgate::Result<()> {
//!     let config = GatewayConfig::load("gateway.yaml")?;
//!     let (results, mut received) = mpsc::channel::<Arc<ExtractedFrame>>(64);
//!     let gateway = Gateway::spawn(&config, ReaderSource::new(tokio::io::empty()), results)?;
//!
//!     let mut display = gateway.subscribe(UpdateRate::Max(2));
//!     tokio::spawn(async move {
//!         while let Some(frame) = display.next().await {
//!             println!("#{} {} fields", frame.metadata.sequence, frame.fields.len());
//!         }
//!     });
//!
//!     while let Some(frame) = received.recv().await {
//!         for field in &frame.fields {
//!             println!("{} = {}", field.name, field.scaled_value);
//!         }
//!     }
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod checksum;
mod error;
pub mod metrics;
pub mod protocol;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Framing and extraction
pub mod assembler;
pub mod extract;

// Runtime
pub mod config;
pub mod driver;
pub mod gateway;
pub mod sink;
pub mod source;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use assembler::{AssemblerEvent, FrameAssembler};
pub use checksum::ChecksumKind;
pub use config::{ConfigStore, GatewayConfig};
pub use extract::extract;
pub use gateway::Gateway;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use protocol::{ProtocolConfig, ProtocolKind};
pub use sink::{NullSink, ResultSink};
pub use source::{ByteSource, ChannelSource, LineError, ReaderSource, SourceEvent, SourceFeeder};
