//! # simtrack-sei
//!
//! Carries small tracking records (frame number, object count, capture
//! timestamp) inside a live H.264 stream as SEI `user_data_unregistered`
//! messages, and recovers them on the receiving side.
//!
//! The sender pushes one [`TrackingRecord`] per inference result into a
//! [`RecordQueue`]; the encoder-output path calls [`inject`] per access unit,
//! which splices one record into each keyframe. The receiver calls
//! [`for_each_record`] per delivered buffer.
//!
//! ## Crate structure
//!
//! - [`nal`] — Framing detection and NAL unit scanning (Annex B / AVC)
//! - [`sei`] — SEI message codec, ff-escape integers, SEI NAL builder
//! - [`payload`] — UUID-tagged JSON payload
//! - [`record`] — `TrackingRecord` and frame stamping
//! - [`queue`] — Drop-oldest bounded record queue
//! - [`inject`] — Keyframe injector
//! - [`extract`] — Receive-side extraction pipeline
//! - [`stats`] — Sender and receiver counters
//! - [`config`] — TOML configuration

pub mod config;
pub mod extract;
pub mod inject;
pub mod nal;
pub mod payload;
pub mod queue;
pub mod record;
pub mod sei;
pub mod stats;

pub use extract::{extract_records, for_each_record};
pub use inject::{inject, inject_frame, EncodedFrame};
pub use nal::{detect_framing, scan, scan_auto, Framing, FramingMode, NalType, NalUnit};
pub use payload::{try_extract, TRACKING_UUID};
pub use queue::{RecordQueue, RecordSource};
pub use record::{FrameCounter, TrackingRecord};
pub use sei::{build_sei_nal, parse_sei_messages, SeiMessage};
pub use stats::{ExtractStats, InjectStats, StreamHealth};
