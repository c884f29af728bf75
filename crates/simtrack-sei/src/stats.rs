//! # Stream Statistics
//!
//! Counters for the sender (injection) and receiver (extraction) paths.
//! Owned by the caller and passed by `&mut` into each call; purely
//! observational. Serializable for JSON reporting.

use serde::Serialize;

use crate::record::TrackingRecord;

// ─── Sender Stats ───────────────────────────────────────────────────────────

/// Injection-side counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InjectStats {
    /// Access units passed through the injector.
    pub access_units: u64,
    /// Access units containing an IDR slice.
    pub keyframes: u64,
    /// SEI units spliced in.
    pub injections: u64,
    /// Keyframes that found no pending record.
    pub keyframes_without_record: u64,
    /// Records dropped because their timestamp was not finite.
    pub unencodable_records: u64,
    /// Total bytes added by injection.
    pub bytes_added: u64,
}

impl InjectStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of keyframes that carried a record.
    pub fn coverage(&self) -> f64 {
        if self.keyframes == 0 {
            0.0
        } else {
            self.injections as f64 / self.keyframes as f64
        }
    }
}

// ─── Receiver Stats ─────────────────────────────────────────────────────────

/// Coarse receive status, evaluated periodically by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamHealth {
    /// No buffer has arrived yet.
    NoData,
    /// At least one record has been extracted.
    Receiving,
    /// Buffers are arriving but none carried a record so far.
    Searching,
}

/// Extraction-side counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractStats {
    /// Buffers scanned.
    pub buffers: u64,
    /// Buffers that produced at least one record.
    pub buffers_with_records: u64,
    /// SEI NAL units seen.
    pub sei_units: u64,
    /// SEI messages parsed.
    pub sei_messages: u64,
    /// SEI units whose message loop ended on a malformed field.
    pub malformed_sei: u64,
    /// Records delivered.
    pub records: u64,
    /// User-data messages carrying a foreign UUID.
    pub tag_mismatches: u64,
    /// Our UUID, but an unreadable body.
    pub decode_failures: u64,
    /// Frame number of the most recent record.
    pub last_frame: u32,
    /// Sum of `objects` over all records.
    pub total_objects: u64,
}

impl ExtractStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a delivered record.
    pub fn record_delivered(&mut self, record: &TrackingRecord) {
        self.records += 1;
        self.last_frame = record.frame;
        self.total_objects += u64::from(record.objects);
    }

    /// Fraction of buffers that produced a record.
    pub fn success_rate(&self) -> f64 {
        if self.buffers == 0 {
            0.0
        } else {
            self.buffers_with_records as f64 / self.buffers as f64
        }
    }

    pub fn health(&self) -> StreamHealth {
        if self.buffers == 0 {
            StreamHealth::NoData
        } else if self.records > 0 {
            StreamHealth::Receiving
        } else {
            StreamHealth::Searching
        }
    }
}
