//! # Tracking Records
//!
//! The metadata carried per keyframe: which inference frame it came from, how
//! many objects were tracked, and when. Serialized as compact JSON with the
//! keys in declaration order: `{"frame":42,"objects":3,"timestamp":1000.25}`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One inference result, immutable once built.
///
/// Only a finite `timestamp` survives JSON: NaN and infinities serialize as
/// `null`, which no receiver can decode. The injector refuses such records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Inference frame number (starts at 1 on the sender).
    pub frame: u32,
    /// Number of objects tracked in that frame.
    pub objects: u32,
    /// Capture time in seconds since the Unix epoch.
    pub timestamp: f64,
}

impl TrackingRecord {
    pub fn new(frame: u32, objects: u32, timestamp: f64) -> Self {
        TrackingRecord {
            frame,
            objects,
            timestamp,
        }
    }

    /// Whether the record can be carried on the wire.
    pub fn is_encodable(&self) -> bool {
        self.timestamp.is_finite()
    }

    /// Compact JSON body. Floats use shortest round-trip formatting.
    pub fn to_json(&self) -> Vec<u8> {
        // Three plain numeric fields: serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse a JSON body. Key order and whitespace are free; unknown keys are ignored.
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

/// Wall-clock seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ─── Frame Counter ───────────────────────────────────────────────────────────

/// Stamps inference results with consecutive frame numbers.
///
/// Runs on the producer side, once per inference callback.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frames: u32,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the record for the next inference frame, timestamped now.
    pub fn stamp(&mut self, objects: u32) -> TrackingRecord {
        self.stamp_at(objects, unix_timestamp())
    }

    /// Like [`stamp`](Self::stamp) with an explicit timestamp.
    pub fn stamp_at(&mut self, objects: u32, timestamp: f64) -> TrackingRecord {
        self.frames = self.frames.wrapping_add(1);
        TrackingRecord::new(self.frames, objects, timestamp)
    }

    /// Frames stamped so far.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}
