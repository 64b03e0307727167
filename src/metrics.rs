//! Lock-free gateway counters.
//!
//! Every counter is a relaxed [`AtomicU64`]; the ingestion and extraction
//! tasks update them concurrently and readers take a [`MetricsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::assembler::AssemblerEvent;
use crate::protocol::Verification;

/// Shared counters for one gateway instance.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    frames_received: AtomicU64,
    frames_verified: AtomicU64,
    frames_unchecked: AtomicU64,
    frames_failed: AtomicU64,
    frames_filtered: AtomicU64,
    overflows: AtomicU64,
    bytes_discarded: AtomicU64,
    line_errors: AtomicU64,
    queue_drops: AtomicU64,
    extraction_failures: AtomicU64,
    frames_published: AtomicU64,
    sink_errors: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Candidate frames completed by the assembler, accepted or not.
    pub frames_received: u64,
    pub frames_verified: u64,
    pub frames_unchecked: u64,
    pub frames_failed: u64,
    pub frames_filtered: u64,
    pub overflows: u64,
    pub bytes_discarded: u64,
    pub line_errors: u64,
    /// Verified frames dropped because the extraction queue was full.
    pub queue_drops: u64,
    pub extraction_failures: u64,
    pub frames_published: u64,
    pub sink_errors: u64,
}

impl MetricsSnapshot {
    /// Frames that passed verification or were not checked.
    pub fn frames_accepted(&self) -> u64 {
        self.frames_verified + self.frames_unchecked
    }
}

#[inline]
fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one assembler event into the counters.
    pub fn record_assembler_event(&self, event: &AssemblerEvent) {
        match event {
            AssemblerEvent::Frame(frame) => {
                bump(&self.frames_received, 1);
                match frame.verification {
                    Verification::Passed => bump(&self.frames_verified, 1),
                    Verification::Skipped => bump(&self.frames_unchecked, 1),
                    Verification::Failed(_) => bump(&self.frames_failed, 1),
                }
            }
            AssemblerEvent::Rejected { .. } => {
                bump(&self.frames_received, 1);
                bump(&self.frames_failed, 1);
            }
            AssemblerEvent::Filtered { .. } => {
                bump(&self.frames_received, 1);
                bump(&self.frames_filtered, 1);
            }
            AssemblerEvent::Overflow { discarded } => {
                bump(&self.overflows, 1);
                bump(&self.bytes_discarded, *discarded as u64);
            }
            AssemblerEvent::Discarded { discarded } => {
                bump(&self.bytes_discarded, *discarded as u64);
            }
        }
    }

    pub fn record_discarded(&self, bytes: usize) {
        bump(&self.bytes_discarded, bytes as u64);
    }

    pub fn record_line_error(&self) {
        bump(&self.line_errors, 1);
    }

    pub fn record_queue_drop(&self) {
        bump(&self.queue_drops, 1);
    }

    pub fn record_extraction_failure(&self) {
        bump(&self.extraction_failures, 1);
    }

    pub fn record_published(&self) {
        bump(&self.frames_published, 1);
    }

    pub fn record_sink_error(&self) {
        bump(&self.sink_errors, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            frames_received: load(&self.frames_received),
            frames_verified: load(&self.frames_verified),
            frames_unchecked: load(&self.frames_unchecked),
            frames_failed: load(&self.frames_failed),
            frames_filtered: load(&self.frames_filtered),
            overflows: load(&self.overflows),
            bytes_discarded: load(&self.bytes_discarded),
            line_errors: load(&self.line_errors),
            queue_drops: load(&self.queue_drops),
            extraction_failures: load(&self.extraction_failures),
            frames_published: load(&self.frames_published),
            sink_errors: load(&self.sink_errors),
        }
    }
}
