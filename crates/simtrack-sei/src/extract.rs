//! # Record Extraction
//!
//! Receive-side pipeline, run once per delivered buffer:
//!
//! ```text
//! buffer → scan (per-buffer framing) → SEI units → SEI messages
//!        → user_data_unregistered → UUID match → JSON → handler
//! ```
//!
//! Every failure along the way skips the offending unit or message and moves
//! on; nothing here returns an error to the caller.

use crate::nal::{hex_preview, scan, FramingMode, NalType};
use crate::payload::{decode_tagged, PayloadError};
use crate::record::TrackingRecord;
use crate::sei::parse_sei_messages;
use crate::stats::ExtractStats;

/// Bytes of buffer head shown in trace logs.
const PREVIEW_LEN: usize = 16;

/// Extract every tracking record in `buffer`, calling `handler` for each in
/// stream order. Returns the number delivered.
pub fn for_each_record<F>(
    buffer: &[u8],
    mode: FramingMode,
    stats: &mut ExtractStats,
    mut handler: F,
) -> usize
where
    F: FnMut(TrackingRecord),
{
    stats.buffers += 1;

    let framing = mode.resolve(buffer);
    let units = scan(buffer, framing);
    tracing::trace!(
        buffer = stats.buffers,
        len = buffer.len(),
        detected = %framing,
        framing = %units.framing(),
        head = %hex_preview(buffer, PREVIEW_LEN),
        "scanning buffer"
    );

    let mut delivered = 0;
    for nal in units {
        tracing::trace!(
            offset = nal.offset,
            nal_type = %nal.nal_type,
            size = nal.payload.len(),
            "nal unit"
        );
        if nal.nal_type != NalType::Sei {
            continue;
        }
        stats.sei_units += 1;

        let mut messages = parse_sei_messages(nal.rbsp());
        for msg in messages.by_ref() {
            stats.sei_messages += 1;
            if !msg.is_user_data_unregistered() {
                continue;
            }

            match decode_tagged(msg.payload) {
                Ok(record) => {
                    stats.record_delivered(&record);
                    delivered += 1;
                    tracing::debug!(
                        frame = record.frame,
                        objects = record.objects,
                        timestamp = record.timestamp,
                        "tracking record extracted"
                    );
                    handler(record);
                }
                Err(PayloadError::TagMismatch | PayloadError::TooShort(_)) => {
                    stats.tag_mismatches += 1;
                }
                Err(e) => {
                    stats.decode_failures += 1;
                    tracing::warn!(
                        error = %e,
                        offset = nal.offset,
                        "dropping unreadable tracking payload"
                    );
                }
            }
        }
        if messages.is_truncated() {
            stats.malformed_sei += 1;
        }
    }

    if delivered > 0 {
        stats.buffers_with_records += 1;
    }
    delivered
}

/// Collect the tracking records in `buffer`.
pub fn extract_records(
    buffer: &[u8],
    mode: FramingMode,
    stats: &mut ExtractStats,
) -> Vec<TrackingRecord> {
    let mut records = Vec::new();
    for_each_record(buffer, mode, stats, |r| records.push(r));
    records
}
