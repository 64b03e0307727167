//! Incremental frame assembly.
//!
//! [`FrameAssembler`] turns an unbounded byte stream into candidate frames under the
//! active [`ProtocolConfig`], verifies each candidate and reports the outcome as
//! [`AssemblerEvent`]s. It performs no I/O and reads no clock: every call carries the
//! arrival instant, so the same byte sequence always yields the same frames whatever
//! chunks it arrives in.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//! use serialgate::assembler::{AssemblerEvent, FrameAssembler};
//! use serialgate::protocol::{NmeaConfig, ProtocolConfig};
//!
//! let config = Arc::new(ProtocolConfig::Nmea0183(NmeaConfig {
//!     validate_checksum: false,
//!     ..Default::default()
//! }));
//! let mut assembler = FrameAssembler::new(config);
//! let events = assembler.push(b"$GPGLL,4916.45,N*00\r\n", Instant::now());
//! assert!(matches!(events.as_slice(), [AssemblerEvent::Frame(_)]));
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::protocol::{
    CustomConfig, LengthField, Marker, ProtocolConfig, Verification, VerifyFailure, verify,
};
use crate::{GatewayError, Result};

/// Default accumulation buffer size.
pub const DEFAULT_FRAME_CAPACITY: usize = 512;

/// Force-emitted buffers shorter than this are dropped instead.
const MIN_FORCED_FRAME: usize = 3;

/// A candidate frame that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    pub data: Vec<u8>,
    /// `Passed` or `Skipped`
    pub verification: Verification,
}

impl AssembledFrame {
    pub fn checksum_verified(&self) -> bool {
        self.verification == Verification::Passed
    }
}

/// Outcome reported by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerEvent {
    /// A verified (or unchecked) frame ready for extraction
    Frame(AssembledFrame),
    /// A candidate failed verification and was dropped
    Rejected { length: usize, failure: VerifyFailure },
    /// A verified NMEA sentence excluded by the sentence or talker filter
    Filtered { length: usize },
    /// The buffer filled up without completing
    Overflow { discarded: usize },
    /// Stale bytes too short to force-emit were dropped
    Discarded { discarded: usize },
}

/// Running totals since the assembler was created.
///
/// `frames_received == frames_verified + frames_unchecked + frames_failed + frames_filtered`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Candidate frames handed to verification
    pub frames_received: u64,
    pub frames_verified: u64,
    /// Accepted without a checksum check
    pub frames_unchecked: u64,
    pub frames_failed: u64,
    pub frames_filtered: u64,
    pub overflows: u64,
    /// Bytes dropped by overflow, staleness, line resets and reconfiguration
    pub bytes_discarded: u64,
}

#[derive(Debug)]
struct FrameBuffer {
    data: Vec<u8>,
    capacity: usize,
    last_rx: Option<Instant>,
}

impl FrameBuffer {
    fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), capacity, last_rx: None }
    }

    fn take(&mut self) -> Vec<u8> {
        self.last_rx = None;
        std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity))
    }

    fn clear(&mut self) -> usize {
        let discarded = self.data.len();
        self.data.clear();
        self.last_rx = None;
        discarded
    }

    fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }
}

/// Per-protocol frame boundary detector.
#[derive(Debug)]
pub struct FrameAssembler {
    config: Arc<ProtocolConfig>,
    buffer: FrameBuffer,
    stats: AssemblerStats,
}

impl FrameAssembler {
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        Self {
            config,
            buffer: FrameBuffer::new(DEFAULT_FRAME_CAPACITY),
            stats: AssemblerStats::default(),
        }
    }

    /// Create an assembler with a custom buffer size.
    pub fn with_capacity(config: Arc<ProtocolConfig>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(GatewayError::invalid_argument("frame buffer capacity must be non-zero"));
        }
        Ok(Self { config, buffer: FrameBuffer::new(capacity), stats: AssemblerStats::default() })
    }

    pub fn config(&self) -> &Arc<ProtocolConfig> {
        &self.config
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Number of bytes currently accumulated.
    pub fn buffered(&self) -> usize {
        self.buffer.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }

    /// Append a chunk received at `now`.
    ///
    /// Silence rules are evaluated first, so a chunk arriving after the inter-frame gap
    /// closes the previous frame instead of extending it.
    pub fn push(&mut self, bytes: &[u8], now: Instant) -> Vec<AssemblerEvent> {
        let mut events = self.poll(now);

        for &byte in bytes {
            self.buffer.data.push(byte);
            self.buffer.last_rx = Some(now);

            if self.is_complete() {
                let frame = self.buffer.take();
                self.emit(frame, &mut events);
            } else if self.buffer.is_full() {
                let discarded = self.buffer.clear();
                self.stats.overflows += 1;
                self.stats.bytes_discarded += discarded as u64;
                warn!(discarded, protocol = %self.config.kind(), "Frame buffer overflow");
                events.push(AssemblerEvent::Overflow { discarded });
            }
        }

        events
    }

    /// Evaluate silence-based completion and the generic timeout at `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();
        let Some(last_rx) = self.buffer.last_rx else {
            return events;
        };
        let silence = now.saturating_duration_since(last_rx);
        let len = self.buffer.data.len();

        if let ProtocolConfig::ModbusRtu(rtu) = self.config.as_ref() {
            if len >= 4 && silence >= rtu.inter_frame_delay() {
                let frame = self.buffer.take();
                self.emit(frame, &mut events);
                return events;
            }
        }

        if silence >= self.config.silence_timeout() {
            if len >= MIN_FORCED_FRAME {
                trace!(len, ?silence, "Silence timeout, forcing frame");
                let frame = self.buffer.take();
                self.emit(frame, &mut events);
            } else {
                let discarded = self.buffer.clear();
                self.stats.bytes_discarded += discarded as u64;
                trace!(discarded, "Silence timeout, dropping stale bytes");
                events.push(AssemblerEvent::Discarded { discarded });
            }
        }

        events
    }

    /// End of input: settle the buffer as if the line had gone silent after the last byte.
    pub fn flush(&mut self) -> Vec<AssemblerEvent> {
        match self.buffer.last_rx {
            Some(last_rx) => self.poll(last_rx + self.config.silence_timeout()),
            None => Vec::new(),
        }
    }

    /// Swap the protocol. Bytes accumulated under the old settings are discarded.
    ///
    /// Returns the number of discarded bytes.
    pub fn reconfigure(&mut self, config: Arc<ProtocolConfig>) -> usize {
        let discarded = self.buffer.clear();
        self.stats.bytes_discarded += discarded as u64;
        debug!(
            from = %self.config.kind(),
            to = %config.kind(),
            discarded,
            "Assembler reconfigured"
        );
        self.config = config;
        discarded
    }

    /// Drop the in-progress buffer after a line-level overrun. Returns the discarded count.
    pub fn reset(&mut self) -> usize {
        let discarded = self.buffer.clear();
        self.stats.bytes_discarded += discarded as u64;
        discarded
    }

    fn emit(&mut self, data: Vec<u8>, events: &mut Vec<AssemblerEvent>) {
        self.stats.frames_received += 1;
        let length = data.len();

        match verify(&self.config, &data) {
            Verification::Failed(failure) => {
                self.stats.frames_failed += 1;
                debug!(
                    length,
                    ?failure,
                    protocol = %self.config.kind(),
                    "Frame failed verification"
                );
                events.push(AssemblerEvent::Rejected { length, failure });
            }
            verification => {
                if let ProtocolConfig::Nmea0183(nmea) = self.config.as_ref() {
                    if !nmea.accepts(&data) {
                        self.stats.frames_filtered += 1;
                        trace!(length, "Sentence filtered");
                        events.push(AssemblerEvent::Filtered { length });
                        return;
                    }
                }
                if verification == Verification::Passed {
                    self.stats.frames_verified += 1;
                } else {
                    self.stats.frames_unchecked += 1;
                }
                debug!(length, ?verification, "Frame assembled");
                events.push(AssemblerEvent::Frame(AssembledFrame { data, verification }));
            }
        }
    }

    /// Delimiter and length rules, evaluated after every appended byte.
    fn is_complete(&self) -> bool {
        let data = self.buffer.data.as_slice();
        let len = data.len();
        match self.config.as_ref() {
            ProtocolConfig::Custom(cfg) => custom_complete(cfg, data),
            // completion needs silence, handled by poll
            ProtocolConfig::ModbusRtu(_) => false,
            ProtocolConfig::ModbusAscii(_) => {
                len >= 9 && data[0] == b':' && data.ends_with(b"\r\n")
            }
            ProtocolConfig::Nmea0183(_) => len >= 6 && data[0] == b'$' && data.ends_with(b"\r\n"),
            ProtocolConfig::Iec101(_) => iec101_complete(data),
        }
    }
}

fn custom_complete(cfg: &CustomConfig, data: &[u8]) -> bool {
    let len = data.len();
    if cfg.frame_length > 0 && len >= usize::from(cfg.frame_length) {
        return true;
    }
    if let Some(etx) = cfg.etx {
        if etx_complete(cfg, etx, data) {
            return true;
        }
    }
    if let Some(field) = cfg.length_field {
        if let Some(target) = declared_length(field, data) {
            return len >= target;
        }
    }
    false
}

/// The end marker completes a frame at the tail once it follows the checksum trailer,
/// or when it sits right before a checksum that has just been completed.
fn etx_complete(cfg: &CustomConfig, etx: Marker, data: &[u8]) -> bool {
    let len = data.len();
    let width = cfg.checksum.kind.size();
    if width == 0 {
        return etx.ends_at(data, len);
    }
    let checksum_offset = usize::from(cfg.checksum.offset);
    let trailer_end = checksum_offset + width;
    // A checksum byte equal to the marker is not an end marker.
    if len >= trailer_end + etx.width() && etx.ends_at(data, len) {
        return true;
    }
    len == trailer_end && etx.ends_at(data, checksum_offset)
}

fn declared_length(field: LengthField, data: &[u8]) -> Option<usize> {
    let offset = usize::from(field.offset);
    let size = usize::from(field.size);
    let declared = match data.get(offset..offset + size)? {
        [value] => usize::from(*value),
        [lo, hi] => usize::from(u16::from_le_bytes([*lo, *hi])),
        _ => return None,
    };
    Some(if field.includes_header { declared } else { declared + offset + size })
}

fn iec101_complete(data: &[u8]) -> bool {
    match data {
        [0xE5] => true,
        [0x10, .., last] if data.len() >= 5 => *last == 0x16,
        [0x68, length, repeat, 0x68, .., last] if data.len() >= 6 => {
            length == repeat && data.len() >= 4 + usize::from(*length) + 2 && *last == 0x16
        }
        _ => false,
    }
}
